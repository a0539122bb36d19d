// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

use crate::ids::*;
use crate::row::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReplenishmentSystem {
    Buy,
    Make,
    #[serde(rename = "Buy and Make")]
    BuyAndMake,
}

impl ReplenishmentSystem {
    pub const ALL: [Self; 3] = [Self::Buy, Self::Make, Self::BuyAndMake];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Make => "Make",
            Self::BuyAndMake => "Buy and Make",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Buy" => Some(Self::Buy),
            "Make" => Some(Self::Make),
            "Buy and Make" => Some(Self::BuyAndMake),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MethodType {
    Buy,
    Make,
    Pick,
}

impl MethodType {
    pub const ALL: [Self; 3] = [Self::Buy, Self::Make, Self::Pick];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Make => "Make",
            Self::Pick => "Pick",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Buy" => Some(Self::Buy),
            "Make" => Some(Self::Make),
            "Pick" => Some(Self::Pick),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrackingType {
    Inventory,
    #[serde(rename = "Non-Inventory")]
    NonInventory,
    Serial,
    Batch,
}

impl TrackingType {
    pub const ALL: [Self; 4] = [
        Self::Inventory,
        Self::NonInventory,
        Self::Serial,
        Self::Batch,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inventory => "Inventory",
            Self::NonInventory => "Non-Inventory",
            Self::Serial => "Serial",
            Self::Batch => "Batch",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Inventory" => Some(Self::Inventory),
            "Non-Inventory" => Some(Self::NonInventory),
            "Serial" => Some(Self::Serial),
            "Batch" => Some(Self::Batch),
            _ => None,
        }
    }
}

/// Presence status of an employee, stored as the codes "1", "2" and "3".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EmployeeStatus {
    Available,
    InTransit,
    Unavailable,
}

impl EmployeeStatus {
    pub const ALL: [Self; 3] = [Self::Available, Self::InTransit, Self::Unavailable];

    pub const fn code(self) -> &'static str {
        match self {
            Self::Available => "1",
            Self::InTransit => "2",
            Self::Unavailable => "3",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::InTransit => "In Transit",
            Self::Unavailable => "Unavailable",
        }
    }

    pub const fn color(self) -> StatusColor {
        match self {
            Self::Available => StatusColor::Green,
            Self::InTransit => StatusColor::Yellow,
            Self::Unavailable => StatusColor::Red,
        }
    }

    pub fn parse_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Available),
            "2" => Some(Self::InTransit),
            "3" => Some(Self::Unavailable),
            _ => None,
        }
    }

    /// Unknown or missing codes display as unavailable.
    pub fn from_code_lossy(code: Option<&str>) -> Self {
        code.and_then(Self::parse_code).unwrap_or(Self::Unavailable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusColor {
    Gray,
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRevision {
    pub id: ItemId,
    pub revision: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub id: ItemId,
    pub readable_id_with_revision: String,
    pub name: String,
    pub description: String,
    pub thumbnail_path: Option<String>,
    pub item_tracking_type: TrackingType,
    pub default_method_type: MethodType,
    pub replenishment_system: ReplenishmentSystem,
    #[serde(default)]
    pub tags: Vec<String>,
    pub active: bool,
    #[serde(default)]
    pub revisions: Vec<PartRevision>,
    pub created_by: UserId,
    #[serde(with = "timestamp")]
    pub created_at: OffsetDateTime,
    pub updated_by: Option<UserId>,
    #[serde(with = "timestamp::option", default)]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub employee_type_id: Option<EmployeeTypeId>,
    pub active: bool,
    pub employee_status_id: Option<String>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let trimmed = name.trim();
        if trimmed.is_empty() {
            self.email.clone()
        } else {
            trimmed.to_owned()
        }
    }

    pub fn status(&self) -> EmployeeStatus {
        EmployeeStatus::from_code_lossy(self.employee_status_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeType {
    pub id: EmployeeTypeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

/// Side-loaded reference sets used for labels and dynamic filter options.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lookups {
    pub employee_types: Vec<EmployeeType>,
    pub people: Vec<Person>,
    pub tags: Vec<Tag>,
}

impl Lookups {
    pub fn employee_type_name(&self, id: Option<&EmployeeTypeId>) -> &str {
        id.and_then(|id| self.employee_types.iter().find(|kind| &kind.id == id))
            .map_or("", |kind| kind.name.as_str())
    }

    pub fn person_name(&self, id: Option<&UserId>) -> &str {
        id.and_then(|id| self.people.iter().find(|person| &person.id == id))
            .map_or("", |person| person.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomColumnKind {
    Text,
    Numeric,
    Boolean,
    Date,
    List(Vec<String>),
}

/// User-defined column appended after an entity's default columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomColumn {
    pub id: String,
    pub header: String,
    pub kind: CustomColumnKind,
}

/// One page of rows as returned by a loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<R> {
    pub rows: Vec<R>,
    pub count: usize,
    /// Change-log head observed when the page was read.
    pub revision: u64,
}

impl<R> Page<R> {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            count: 0,
            revision: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeUpload {
    pub id: UploadId,
    pub image_path: String,
    pub name: String,
    pub size: i64,
    pub serial_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUpload {
    pub id: UploadId,
    pub model_path: String,
    pub name: String,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFile {
    pub id: FileId,
    pub item_id: ItemId,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub checksum_sha256: String,
    #[serde(with = "timestamp")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSummary {
    pub id: ItemId,
    pub name: String,
    pub readable_id_with_revision: String,
    pub notes: String,
    pub model_upload_id: Option<UploadId>,
    pub model_path: Option<String>,
}

/// RFC 3339 wire format for timestamps.
pub mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub fn serialize<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = value.format(&Rfc3339).map_err(S::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&raw, &Rfc3339).map_err(D::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};
        use time::OffsetDateTime;
        use time::format_description::well_known::Rfc3339;

        pub fn serialize<S: Serializer>(
            value: &Option<OffsetDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => {
                    let formatted = value.format(&Rfc3339).map_err(S::Error::custom)?;
                    serializer.serialize_some(&formatted)
                }
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<OffsetDateTime>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|raw| OffsetDateTime::parse(&raw, &Rfc3339).map_err(D::Error::custom))
                .transpose()
        }
    }
}
