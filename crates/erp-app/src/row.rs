// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::ListError;
use crate::ids::{EmployeeTypeId, RowId, UserId};
use crate::model::{Employee, MethodType, Part, ReplenishmentSystem, TrackingType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Text(String),
    List(Vec<String>),
    Timestamp(OffsetDateTime),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(Self::Null, |value| Self::Text(value.to_owned()))
    }

    /// Literal sent back as a query parameter; booleans become `"true"`/`"false"`.
    pub fn as_query_literal(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(true) => "true".to_owned(),
            Self::Bool(false) => "false".to_owned(),
            Self::Text(value) => value.clone(),
            Self::List(values) => values.join(","),
            Self::Timestamp(value) => value.format(&Rfc3339).unwrap_or_default(),
        }
    }

    /// Each element as a query literal; scalars yield one element, null none.
    pub fn query_literals(&self) -> Vec<String> {
        match self {
            Self::Null => Vec::new(),
            Self::List(values) => values.clone(),
            other => vec![other.as_query_literal()],
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn from_json(value: &Value) -> Result<Self, ListError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(value) => Ok(Self::Bool(*value)),
            Value::String(value) => Ok(Self::Text(value.clone())),
            Value::Number(value) => Ok(Self::Text(value.to_string())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(value) => Ok(value.clone()),
                    Value::Number(value) => Ok(value.to_string()),
                    other => Err(ListError::InvalidPatch(format!(
                        "list element {other} is not a string"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            Value::Object(_) => Err(ListError::InvalidPatch(
                "nested objects are not supported as field values".to_owned(),
            )),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(value) => Value::Bool(*value),
            Self::Text(value) => Value::String(value.clone()),
            Self::List(values) => Value::Array(values.iter().cloned().map(Value::String).collect()),
            Self::Timestamp(value) => Value::String(value.format(&Rfc3339).unwrap_or_default()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// A record displayed in a list view.
pub trait EntityRow: Clone {
    fn row_id(&self) -> RowId;

    /// Value of a named field, or `None` when the row has no such field.
    fn field(&self, key: &str) -> Option<FieldValue>;

    /// Overwrite one field. Returns whether the stored value changed.
    fn set_field(&mut self, key: &str, value: FieldValue) -> Result<bool, ListError>;

    fn custom_field(&self, _id: &str) -> Option<&FieldValue> {
        None
    }
}

fn invalid(field: &str, value: &FieldValue) -> ListError {
    ListError::InvalidFieldValue {
        field: field.to_owned(),
        value: value.as_query_literal(),
    }
}

fn expect_text(field: &str, value: &FieldValue) -> Result<String, ListError> {
    match value {
        FieldValue::Text(text) => Ok(text.clone()),
        other => Err(invalid(field, other)),
    }
}

fn expect_opt_text(field: &str, value: &FieldValue) -> Result<Option<String>, ListError> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Text(text) => Ok(Some(text.clone())),
        other => Err(invalid(field, other)),
    }
}

fn expect_bool(field: &str, value: &FieldValue) -> Result<bool, ListError> {
    match value {
        FieldValue::Bool(flag) => Ok(*flag),
        FieldValue::Text(text) if text == "true" => Ok(true),
        FieldValue::Text(text) if text == "false" => Ok(false),
        other => Err(invalid(field, other)),
    }
}

fn expect_timestamp(field: &str, value: &FieldValue) -> Result<Option<OffsetDateTime>, ListError> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Timestamp(at) => Ok(Some(*at)),
        FieldValue::Text(raw) => OffsetDateTime::parse(raw, &Rfc3339)
            .map(Some)
            .map_err(|_| invalid(field, value)),
        other => Err(invalid(field, other)),
    }
}

fn replace<T: PartialEq>(slot: &mut T, next: T) -> bool {
    if *slot == next {
        return false;
    }
    *slot = next;
    true
}

impl EntityRow for Part {
    fn row_id(&self) -> RowId {
        self.id.as_str().to_owned()
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        let value = match key {
            "id" => FieldValue::text(self.id.as_str()),
            "readableIdWithRevision" => FieldValue::text(&self.readable_id_with_revision),
            "name" => FieldValue::text(&self.name),
            "description" => FieldValue::text(&self.description),
            "thumbnailPath" => FieldValue::opt_text(self.thumbnail_path.as_deref()),
            "itemTrackingType" => FieldValue::text(self.item_tracking_type.as_str()),
            "defaultMethodType" => FieldValue::text(self.default_method_type.as_str()),
            "replenishmentSystem" => FieldValue::text(self.replenishment_system.as_str()),
            "tags" => FieldValue::List(self.tags.clone()),
            "active" => FieldValue::Bool(self.active),
            "createdBy" => FieldValue::text(self.created_by.as_str()),
            "createdAt" => FieldValue::Timestamp(self.created_at),
            "updatedBy" => FieldValue::opt_text(self.updated_by.as_ref().map(UserId::as_str)),
            "updatedAt" => self.updated_at.map_or(FieldValue::Null, FieldValue::Timestamp),
            _ => return None,
        };
        Some(value)
    }

    fn set_field(&mut self, key: &str, value: FieldValue) -> Result<bool, ListError> {
        let changed = match key {
            "id" | "readableIdWithRevision" | "createdBy" | "createdAt" => {
                return Err(ListError::ImmutableField {
                    field: key.to_owned(),
                });
            }
            "name" => replace(&mut self.name, expect_text(key, &value)?),
            "description" => replace(&mut self.description, expect_text(key, &value)?),
            "thumbnailPath" => replace(&mut self.thumbnail_path, expect_opt_text(key, &value)?),
            "itemTrackingType" => {
                let raw = expect_text(key, &value)?;
                let parsed = TrackingType::parse(&raw).ok_or_else(|| invalid(key, &value))?;
                replace(&mut self.item_tracking_type, parsed)
            }
            "defaultMethodType" => {
                let raw = expect_text(key, &value)?;
                let parsed = MethodType::parse(&raw).ok_or_else(|| invalid(key, &value))?;
                replace(&mut self.default_method_type, parsed)
            }
            "replenishmentSystem" => {
                let raw = expect_text(key, &value)?;
                let parsed =
                    ReplenishmentSystem::parse(&raw).ok_or_else(|| invalid(key, &value))?;
                replace(&mut self.replenishment_system, parsed)
            }
            "tags" => match value {
                FieldValue::List(tags) => replace(&mut self.tags, tags),
                FieldValue::Null => replace(&mut self.tags, Vec::new()),
                other => return Err(invalid(key, &other)),
            },
            "active" => replace(&mut self.active, expect_bool(key, &value)?),
            "updatedBy" => replace(
                &mut self.updated_by,
                expect_opt_text(key, &value)?.map(UserId::new),
            ),
            "updatedAt" => replace(&mut self.updated_at, expect_timestamp(key, &value)?),
            custom => match custom.strip_prefix("customFields.") {
                Some(id) => {
                    if self.custom_fields.get(id) == Some(&value) {
                        false
                    } else {
                        self.custom_fields.insert(id.to_owned(), value);
                        true
                    }
                }
                None => {
                    return Err(ListError::InvalidFieldValue {
                        field: key.to_owned(),
                        value: value.as_query_literal(),
                    });
                }
            },
        };
        Ok(changed)
    }

    fn custom_field(&self, id: &str) -> Option<&FieldValue> {
        self.custom_fields.get(id)
    }
}

impl EntityRow for Employee {
    fn row_id(&self) -> RowId {
        self.id.as_str().to_owned()
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        let value = match key {
            "id" => FieldValue::text(self.id.as_str()),
            "firstName" => FieldValue::text(&self.first_name),
            "lastName" => FieldValue::text(&self.last_name),
            "email" => FieldValue::text(&self.email),
            "employeeTypeId" => {
                FieldValue::opt_text(self.employee_type_id.as_ref().map(EmployeeTypeId::as_str))
            }
            "active" => FieldValue::Bool(self.active),
            "employeeStatusId" => FieldValue::opt_text(self.employee_status_id.as_deref()),
            _ => return None,
        };
        Some(value)
    }

    fn set_field(&mut self, key: &str, value: FieldValue) -> Result<bool, ListError> {
        let changed = match key {
            "id" => {
                return Err(ListError::ImmutableField {
                    field: key.to_owned(),
                });
            }
            "firstName" => replace(&mut self.first_name, expect_text(key, &value)?),
            "lastName" => replace(&mut self.last_name, expect_text(key, &value)?),
            "email" => replace(&mut self.email, expect_text(key, &value)?),
            "employeeTypeId" => replace(
                &mut self.employee_type_id,
                expect_opt_text(key, &value)?.map(EmployeeTypeId::new),
            ),
            "active" => replace(&mut self.active, expect_bool(key, &value)?),
            "employeeStatusId" => {
                replace(&mut self.employee_status_id, expect_opt_text(key, &value)?)
            }
            _ => {
                return Err(ListError::InvalidFieldValue {
                    field: key.to_owned(),
                    value: value.as_query_literal(),
                });
            }
        };
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityRow, FieldValue};
    use crate::{Employee, EmployeeId, ListError};
    use serde_json::json;

    fn employee() -> Employee {
        Employee {
            id: EmployeeId::new("E1"),
            first_name: "Avery".to_owned(),
            last_name: "Walker".to_owned(),
            email: "avery@example.com".to_owned(),
            employee_type_id: None,
            active: false,
            employee_status_id: Some("1".to_owned()),
        }
    }

    #[test]
    fn boolean_literals_are_strings() {
        assert_eq!(FieldValue::Bool(true).as_query_literal(), "true");
        assert_eq!(FieldValue::Bool(false).as_query_literal(), "false");
    }

    #[test]
    fn json_conversion_handles_scalars_and_lists() -> Result<(), ListError> {
        assert_eq!(FieldValue::from_json(&json!(true))?, FieldValue::Bool(true));
        assert_eq!(FieldValue::from_json(&json!(2))?, FieldValue::text("2"));
        assert_eq!(
            FieldValue::from_json(&json!(["a", "b"]))?,
            FieldValue::List(vec!["a".to_owned(), "b".to_owned()])
        );
        assert!(FieldValue::from_json(&json!({"nested": 1})).is_err());
        Ok(())
    }

    #[test]
    fn set_field_reports_change_once() -> Result<(), ListError> {
        let mut row = employee();
        assert!(row.set_field("employeeStatusId", FieldValue::text("2"))?);
        assert!(!row.set_field("employeeStatusId", FieldValue::text("2"))?);
        assert_eq!(row.employee_status_id.as_deref(), Some("2"));
        Ok(())
    }

    #[test]
    fn set_field_accepts_boolean_strings() -> Result<(), ListError> {
        let mut row = employee();
        assert!(row.set_field("active", FieldValue::text("true"))?);
        assert!(row.active);
        Ok(())
    }

    #[test]
    fn id_is_immutable() {
        let mut row = employee();
        let error = row
            .set_field("id", FieldValue::text("E2"))
            .expect_err("id must not change");
        assert!(matches!(error, ListError::ImmutableField { .. }));
    }
}
