// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, trace};

use crate::error::ListError;
use crate::ids::RowId;
use crate::row::{EntityRow, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Field-level partial update for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub id: RowId,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Patch {
    pub fn new(id: impl Into<RowId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: FieldValue) -> Self {
        self.fields.insert(field.to_owned(), value);
        self
    }

    /// Parses a row-shaped JSON object. `"id"` is required.
    pub fn from_json(value: &Value) -> Result<Self, ListError> {
        let Value::Object(object) = value else {
            return Err(ListError::InvalidPatch("expected a JSON object".to_owned()));
        };
        let id = match object.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(ListError::InvalidPatch("missing string `id`".to_owned())),
        };
        let mut fields = BTreeMap::new();
        for (key, value) in object {
            if key == "id" {
                continue;
            }
            fields.insert(key.clone(), FieldValue::from_json(value)?);
        }
        Ok(Self { id, fields })
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("id".to_owned(), Value::String(self.id.clone()));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.to_json());
        }
        Value::Object(object)
    }

    /// Last-write-wins merge into `row`. Fields the row does not model and
    /// immutable fields are skipped. Returns whether anything changed; on
    /// error `row` is left untouched.
    pub fn apply_to<R: EntityRow>(&self, row: &mut R) -> Result<bool, ListError> {
        let mut staged = row.clone();
        let mut changed = false;
        for (key, value) in &self.fields {
            let known = staged.field(key).is_some() || key.starts_with("customFields.");
            if !known {
                trace!(field = %key, "patch field not modelled, skipping");
                continue;
            }
            match staged.set_field(key, value.clone()) {
                Ok(updated) => changed |= updated,
                Err(ListError::ImmutableField { field }) => {
                    trace!(%field, "patch touches immutable field, skipping");
                }
                Err(error) => return Err(error),
            }
        }
        if changed {
            *row = staged;
        }
        Ok(changed)
    }
}

impl Serialize for Patch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Patch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// One entry of a table's change stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    #[serde(rename = "event")]
    pub kind: ChangeKind,
    pub revision: u64,
    pub new: Patch,
}

struct Subscriber {
    id: u64,
    table: String,
    sender: Sender<ChangeEvent>,
}

#[derive(Default)]
struct FeedInner {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// Single-threaded fan-out of change events to per-table subscribers.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Rc<RefCell<FeedInner>>,
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.inner.borrow().subscribers.len())
            .finish()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, table: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscribers.push(Subscriber {
            id,
            table: table.to_owned(),
            sender,
        });
        debug!(table, id, "realtime subscription opened");
        Subscription {
            id,
            table: table.to_owned(),
            receiver,
            feed: Rc::downgrade(&self.inner),
        }
    }

    /// Delivers to every subscriber of the event's table. Returns the count reached.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let mut inner = self.inner.borrow_mut();
        let mut delivered = 0;
        inner.subscribers.retain(|subscriber| {
            if subscriber.table != event.table {
                return true;
            }
            match subscriber.sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    pub fn subscriber_count(&self, table: &str) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|subscriber| subscriber.table == table)
            .count()
    }
}

/// Handle for one table subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    table: String,
    receiver: Receiver<ChangeEvent>,
    feed: Weak<RefCell<FeedInner>>,
}

impl Subscription {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.upgrade() {
            if let Ok(mut inner) = feed.try_borrow_mut() {
                inner.subscribers.retain(|subscriber| subscriber.id != self.id);
            }
        }
        debug!(table = %self.table, id = self.id, "realtime subscription closed");
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeEvent, ChangeFeed, ChangeKind, Patch};
    use crate::{Employee, EmployeeId, FieldValue};
    use serde_json::json;

    fn event(table: &str, revision: u64) -> ChangeEvent {
        ChangeEvent {
            table: table.to_owned(),
            kind: ChangeKind::Update,
            revision,
            new: Patch::new("E1").with("employeeStatusId", FieldValue::text("2")),
        }
    }

    #[test]
    fn subscribers_only_see_their_table() {
        let feed = ChangeFeed::new();
        let employees = feed.subscribe("employee");
        let items = feed.subscribe("item");

        assert_eq!(feed.publish(&event("employee", 1)), 1);
        assert_eq!(employees.drain().len(), 1);
        assert!(items.drain().is_empty());
        assert!(employees.drain().is_empty());
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let feed = ChangeFeed::new();
        let subscription = feed.subscribe("employee");
        assert_eq!(feed.subscriber_count("employee"), 1);
        drop(subscription);
        assert_eq!(feed.subscriber_count("employee"), 0);
        assert_eq!(feed.publish(&event("employee", 2)), 0);
    }

    #[test]
    fn event_json_shape() -> anyhow::Result<()> {
        let parsed: ChangeEvent = serde_json::from_value(json!({
            "table": "employee",
            "event": "UPDATE",
            "revision": 7,
            "new": {"id": "E1", "active": true},
        }))?;
        assert_eq!(parsed.kind, ChangeKind::Update);
        assert_eq!(parsed.new.fields.get("active"), Some(&FieldValue::Bool(true)));
        assert!(Patch::from_json(&json!({"active": true})).is_err());
        Ok(())
    }

    #[test]
    fn apply_skips_unmodelled_fields_and_is_idempotent() -> anyhow::Result<()> {
        let mut row = Employee {
            id: EmployeeId::new("E1"),
            first_name: "Avery".to_owned(),
            last_name: "Walker".to_owned(),
            email: "avery@example.com".to_owned(),
            employee_type_id: None,
            active: false,
            employee_status_id: Some("3".to_owned()),
        };
        let patch = Patch::from_json(&json!({
            "id": "E1",
            "active": true,
            "companyId": "C1",
        }))?;
        assert!(patch.apply_to(&mut row)?);
        let once = row.clone();
        assert!(!patch.apply_to(&mut row)?);
        assert_eq!(row, once);
        assert!(row.active);
        Ok(())
    }

    #[test]
    fn rejected_patch_leaves_row_untouched() -> anyhow::Result<()> {
        let mut row = Employee {
            id: EmployeeId::new("E1"),
            first_name: "Avery".to_owned(),
            last_name: "Walker".to_owned(),
            email: "avery@example.com".to_owned(),
            employee_type_id: None,
            active: false,
            employee_status_id: None,
        };
        let before = row.clone();
        // `active` sorts before `email`, so it would land first.
        let patch = Patch::from_json(&json!({"id": "E1", "active": true, "email": true}))?;
        assert!(patch.apply_to(&mut row).is_err());
        assert_eq!(row, before);
        Ok(())
    }
}
