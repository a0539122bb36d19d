// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

entity_id!(ItemId);
entity_id!(EmployeeId);
entity_id!(EmployeeTypeId);
entity_id!(UserId);
entity_id!(CompanyId);
entity_id!(UploadId);
entity_id!(FileId);
entity_id!(SessionId);

/// Row identifier as seen by the generic list machinery.
pub type RowId = String;

impl From<EmployeeId> for UserId {
    fn from(value: EmployeeId) -> Self {
        Self(value.0)
    }
}

impl From<UserId> for EmployeeId {
    fn from(value: UserId) -> Self {
        Self(value.0)
    }
}
