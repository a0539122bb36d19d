// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::UploadId;
use crate::model::{ItemFile, MethodType, Part, PartSummary, ReplenishmentSystem, TrackingType};
use crate::notify::Toast;
use crate::row::FieldValue;

pub const MAX_NAME_LEN: usize = 255;
const CUSTOM_PREFIX: &str = "custom-";

/// Field-keyed validation messages returned to the form.
pub type FormErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartFormInput {
    pub name: String,
    pub description: String,
    pub replenishment_system: ReplenishmentSystem,
    pub default_method_type: MethodType,
    pub item_tracking_type: TrackingType,
    pub active: bool,
    pub custom_fields: BTreeMap<String, FieldValue>,
}

impl PartFormInput {
    pub fn from_part(part: &Part) -> Self {
        Self {
            name: part.name.clone(),
            description: part.description.clone(),
            replenishment_system: part.replenishment_system,
            default_method_type: part.default_method_type,
            item_tracking_type: part.item_tracking_type,
            active: part.active,
            custom_fields: part.custom_fields.clone(),
        }
    }

    /// Parses posted form fields. `custom-<id>` keys become custom fields.
    pub fn from_form(fields: &[(String, String)]) -> Result<Self, FormErrors> {
        let get = |key: &str| {
            fields
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.trim().to_owned())
        };
        let mut errors = FormErrors::new();

        let replenishment_system = parse_choice(
            &mut errors,
            "replenishmentSystem",
            get("replenishmentSystem"),
            ReplenishmentSystem::parse,
        );
        let default_method_type = parse_choice(
            &mut errors,
            "defaultMethodType",
            get("defaultMethodType"),
            MethodType::parse,
        );
        let item_tracking_type = parse_choice(
            &mut errors,
            "itemTrackingType",
            get("itemTrackingType"),
            TrackingType::parse,
        );

        let custom_fields = fields
            .iter()
            .filter_map(|(key, value)| {
                let id = key.strip_prefix(CUSTOM_PREFIX)?;
                let value = value.trim();
                let value = if value.is_empty() {
                    FieldValue::Null
                } else {
                    FieldValue::text(value)
                };
                Some((id.to_owned(), value))
            })
            .collect();

        let input = Self {
            name: get("name").unwrap_or_default(),
            description: get("description").unwrap_or_default(),
            replenishment_system: replenishment_system.unwrap_or(ReplenishmentSystem::Buy),
            default_method_type: default_method_type.unwrap_or(MethodType::Buy),
            item_tracking_type: item_tracking_type.unwrap_or(TrackingType::Inventory),
            active: matches!(get("active").as_deref(), Some("true" | "on")),
            custom_fields,
        };
        errors.extend(input.field_errors());
        if errors.is_empty() {
            Ok(input)
        } else {
            Err(errors)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            bail!("part name is required -- enter a name and retry");
        }
        if name.chars().count() > MAX_NAME_LEN {
            bail!("part name must be at most {MAX_NAME_LEN} characters");
        }
        Ok(())
    }

    pub fn field_errors(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        if let Err(error) = self.validate() {
            errors.insert("name".to_owned(), error.to_string());
        }
        errors
    }

    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("name".to_owned(), self.name.clone()),
            ("description".to_owned(), self.description.clone()),
            (
                "replenishmentSystem".to_owned(),
                self.replenishment_system.as_str().to_owned(),
            ),
            (
                "defaultMethodType".to_owned(),
                self.default_method_type.as_str().to_owned(),
            ),
            (
                "itemTrackingType".to_owned(),
                self.item_tracking_type.as_str().to_owned(),
            ),
            ("active".to_owned(), self.active.to_string()),
        ];
        fields.extend(
            self.custom_fields
                .iter()
                .map(|(id, value)| (format!("{CUSTOM_PREFIX}{id}"), value.as_query_literal())),
        );
        fields
    }
}

/// A part merged with its barcode and CAD model uploads, ready for editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartEditView {
    pub part: Part,
    pub serial_number: Option<String>,
    pub barcode_upload_id: Option<UploadId>,
    pub barcode_file_name: Option<String>,
    pub model_upload_id: Option<UploadId>,
    pub model_file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CadModelView {
    pub upload_id: Option<UploadId>,
    pub path: Option<String>,
    pub read_only: bool,
}

/// What the details pane shows. Documents and the CAD model are only
/// present for employees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartDetailsView {
    pub summary: PartSummary,
    pub documents: Option<Vec<ItemFile>>,
    pub cad_model: Option<CadModelView>,
}

/// Result of posting a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Invalid(FormErrors),
    Redirect { to: String, flash: Option<Toast> },
}

impl ActionResult {
    pub fn redirect(to: impl Into<String>) -> Self {
        Self::Redirect {
            to: to.into(),
            flash: None,
        }
    }

    pub fn redirect_with(to: impl Into<String>, flash: Toast) -> Self {
        Self::Redirect {
            to: to.into(),
            flash: Some(flash),
        }
    }
}

fn parse_choice<T>(
    errors: &mut FormErrors,
    field: &str,
    raw: Option<String>,
    parse: fn(&str) -> Option<T>,
) -> Option<T> {
    match raw {
        None => {
            errors.insert(field.to_owned(), format!("{field} is required"));
            None
        }
        Some(raw) => {
            let parsed = parse(&raw);
            if parsed.is_none() {
                errors.insert(field.to_owned(), format!("{raw:?} is not a valid choice"));
            }
            parsed
        }
    }
}
