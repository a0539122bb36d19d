// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::error::ListError;
use crate::model::{MethodType, ReplenishmentSystem, TrackingType};
use crate::notify::Toast;
use crate::row::EntityRow;

/// A field that may be changed on many rows at once, with a closed value domain.
pub trait BulkField: Copy + Eq + Debug + 'static {
    fn all() -> &'static [Self];
    fn as_str(self) -> &'static str;
    fn label(self) -> &'static str;
    fn domain(self) -> Vec<&'static str>;

    fn parse(value: &str) -> Option<Self> {
        Self::all().iter().copied().find(|field| field.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartBulkField {
    ReplenishmentSystem,
    DefaultMethodType,
    ItemTrackingType,
}

impl BulkField for PartBulkField {
    fn all() -> &'static [Self] {
        &[
            Self::ReplenishmentSystem,
            Self::DefaultMethodType,
            Self::ItemTrackingType,
        ]
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::ReplenishmentSystem => "replenishmentSystem",
            Self::DefaultMethodType => "defaultMethodType",
            Self::ItemTrackingType => "itemTrackingType",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::ReplenishmentSystem => "Replenishment",
            Self::DefaultMethodType => "Default Method Type",
            Self::ItemTrackingType => "Tracking Type",
        }
    }

    fn domain(self) -> Vec<&'static str> {
        match self {
            Self::ReplenishmentSystem => ReplenishmentSystem::ALL.map(ReplenishmentSystem::as_str).to_vec(),
            Self::DefaultMethodType => MethodType::ALL.map(MethodType::as_str).to_vec(),
            Self::ItemTrackingType => TrackingType::ALL.map(TrackingType::as_str).to_vec(),
        }
    }
}

/// For tables whose bulk actions open dialogs instead of updating a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoBulkField {}

impl BulkField for NoBulkField {
    fn all() -> &'static [Self] {
        &[]
    }

    fn as_str(self) -> &'static str {
        match self {}
    }

    fn label(self) -> &'static str {
        match self {}
    }

    fn domain(self) -> Vec<&'static str> {
        match self {}
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest {
    pub identifiers: Vec<String>,
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateError {
    pub message: String,
}

/// Either success or `{"error": {"message": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<UpdateError>,
}

impl UpdateResponse {
    pub fn ok() -> Self {
        Self { error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(UpdateError {
                message: message.into(),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Where batched field updates are submitted.
pub trait UpdateEndpoint {
    fn bulk_update(&self, request: &BulkUpdateRequest) -> anyhow::Result<UpdateResponse>;
}

/// Composes batched updates and enforces a single submission in flight.
#[derive(Debug)]
pub struct BulkDispatcher<F> {
    pending: Option<BulkUpdateRequest>,
    _field: PhantomData<F>,
}

impl<F> Default for BulkDispatcher<F> {
    fn default() -> Self {
        Self {
            pending: None,
            _field: PhantomData,
        }
    }
}

impl<F: BulkField> BulkDispatcher<F> {
    pub fn is_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&BulkUpdateRequest> {
        self.pending.as_ref()
    }

    /// Builds the request and marks it in flight. Rows are left untouched.
    pub fn compose<R: EntityRow>(
        &mut self,
        rows: &[R],
        field: F,
        value: &str,
    ) -> Result<BulkUpdateRequest, ListError> {
        if self.pending.is_some() {
            return Err(ListError::BulkInFlight);
        }
        if rows.is_empty() {
            return Err(ListError::EmptySelection);
        }
        if !field.domain().contains(&value) {
            return Err(ListError::ValueOutOfDomain {
                field: field.as_str().to_owned(),
                value: value.to_owned(),
            });
        }
        let request = BulkUpdateRequest {
            identifiers: rows.iter().map(EntityRow::row_id).collect(),
            field: field.as_str().to_owned(),
            value: value.to_owned(),
        };
        debug!(
            field = %request.field,
            value = %request.value,
            rows = request.identifiers.len(),
            "composed bulk update"
        );
        self.pending = Some(request.clone());
        Ok(request)
    }

    /// Clears the in-flight guard and yields exactly one notification.
    pub fn complete(&mut self, response: &UpdateResponse) -> Result<Toast, ListError> {
        let request = self.pending.take().ok_or(ListError::NoBulkPending)?;
        Ok(match &response.error {
            Some(error) => {
                warn!(field = %request.field, error = %error.message, "bulk update rejected");
                Toast::error(error.message.clone())
            }
            None => Toast::info(format!(
                "Updated {} on {} {}",
                request.field,
                request.identifiers.len(),
                if request.identifiers.len() == 1 {
                    "row"
                } else {
                    "rows"
                }
            )),
        })
    }

    /// The endpoint could not be reached; treated like an error payload.
    pub fn fail(&mut self, error: &anyhow::Error) -> Result<Toast, ListError> {
        self.complete(&UpdateResponse::failed(format!("{error:#}")))
    }

    pub fn submit<R: EntityRow>(
        &mut self,
        rows: &[R],
        field: F,
        value: &str,
        endpoint: &dyn UpdateEndpoint,
    ) -> Result<Toast, ListError> {
        let request = self.compose(rows, field, value)?;
        match endpoint.bulk_update(&request) {
            Ok(response) => self.complete(&response),
            Err(error) => self.fail(&error),
        }
    }

    /// Drops the pending request without producing feedback.
    pub fn abandon(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BulkDispatcher, BulkField, BulkUpdateRequest, NoBulkField, PartBulkField, UpdateEndpoint,
        UpdateResponse,
    };
    use crate::{
        ItemId, ListError, MethodType, Part, ReplenishmentSystem, ToastLevel, TrackingType, UserId,
    };
    use std::cell::RefCell;
    use time::macros::datetime;

    fn rows(ids: &[&str]) -> Vec<Part> {
        ids.iter()
            .map(|id| Part {
                id: ItemId::new(*id),
                readable_id_with_revision: format!("{id}.A"),
                name: format!("Part {id}"),
                description: String::new(),
                thumbnail_path: None,
                item_tracking_type: TrackingType::Inventory,
                default_method_type: MethodType::Buy,
                replenishment_system: ReplenishmentSystem::Make,
                tags: Vec::new(),
                active: true,
                revisions: Vec::new(),
                created_by: UserId::new("u1"),
                created_at: datetime!(2026-03-02 08:00 UTC),
                updated_by: None,
                updated_at: None,
                custom_fields: Default::default(),
            })
            .collect()
    }

    struct Recorder {
        requests: RefCell<Vec<BulkUpdateRequest>>,
        response: UpdateResponse,
    }

    impl UpdateEndpoint for Recorder {
        fn bulk_update(&self, request: &BulkUpdateRequest) -> anyhow::Result<UpdateResponse> {
            self.requests.borrow_mut().push(request.clone());
            Ok(self.response.clone())
        }
    }

    #[test]
    fn compose_builds_one_batched_request() -> anyhow::Result<()> {
        let mut dispatcher = BulkDispatcher::default();
        let request = dispatcher.compose(&rows(&["P1", "P2"]), PartBulkField::ReplenishmentSystem, "Buy")?;
        assert_eq!(
            serde_json::to_value(&request)?,
            serde_json::json!({
                "identifiers": ["P1", "P2"],
                "field": "replenishmentSystem",
                "value": "Buy",
            })
        );
        Ok(())
    }

    #[test]
    fn second_submission_is_rejected_while_pending() -> anyhow::Result<()> {
        let mut dispatcher = BulkDispatcher::default();
        dispatcher.compose(&rows(&["P1"]), PartBulkField::DefaultMethodType, "Make")?;
        let error = dispatcher
            .compose(&rows(&["P2"]), PartBulkField::DefaultMethodType, "Pick")
            .expect_err("guard must reject");
        assert_eq!(error, ListError::BulkInFlight);

        dispatcher.complete(&UpdateResponse::ok())?;
        assert!(!dispatcher.is_in_flight());
        dispatcher.compose(&rows(&["P2"]), PartBulkField::DefaultMethodType, "Pick")?;
        Ok(())
    }

    #[test]
    fn value_outside_domain_is_rejected() {
        let mut dispatcher = BulkDispatcher::default();
        let error = dispatcher
            .compose(&rows(&["P1"]), PartBulkField::ItemTrackingType, "Lot")
            .expect_err("unknown tracking type");
        assert!(matches!(error, ListError::ValueOutOfDomain { .. }));
        assert!(!dispatcher.is_in_flight());
    }

    #[test]
    fn empty_selection_is_rejected() {
        let mut dispatcher = BulkDispatcher::default();
        let error = dispatcher
            .compose(&rows(&[]), PartBulkField::ItemTrackingType, "Serial")
            .expect_err("nothing selected");
        assert_eq!(error, ListError::EmptySelection);
    }

    #[test]
    fn error_payload_yields_one_error_toast() -> anyhow::Result<()> {
        let endpoint = Recorder {
            requests: RefCell::new(Vec::new()),
            response: UpdateResponse::failed("conflict"),
        };
        let mut dispatcher = BulkDispatcher::default();
        let toast = dispatcher.submit(
            &rows(&["P1", "P2"]),
            PartBulkField::ReplenishmentSystem,
            "Buy",
            &endpoint,
        )?;
        assert_eq!(toast.level, ToastLevel::Error);
        assert!(toast.message.contains("conflict"));
        assert_eq!(endpoint.requests.borrow().len(), 1);
        assert!(!dispatcher.is_in_flight());
        Ok(())
    }

    #[test]
    fn complete_without_pending_is_an_error() {
        let mut dispatcher = BulkDispatcher::<PartBulkField>::default();
        assert_eq!(
            dispatcher.complete(&UpdateResponse::ok()),
            Err(ListError::NoBulkPending)
        );
    }

    #[test]
    fn fields_parse_from_wire_names() {
        assert_eq!(
            PartBulkField::parse("itemTrackingType"),
            Some(PartBulkField::ItemTrackingType)
        );
        assert_eq!(PartBulkField::parse("name"), None);
        assert!(NoBulkField::all().is_empty());
    }
}
