// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

use crate::modal::ModalKind;

/// Errors raised by the list-view machinery that callers match on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("column `{column}` reads field `{field}` which row {row} does not have")]
    UnknownAccessor {
        column: String,
        field: String,
        row: String,
    },

    #[error("column `{column}` lists filter value {value:?} more than once")]
    DuplicateFilterValue { column: String, value: String },

    #[error("field `{field}` cannot be changed from a patch")]
    ImmutableField { field: String },

    #[error("value {value:?} is not valid for field `{field}`")]
    InvalidFieldValue { field: String, value: String },

    #[error("no rows selected -- select at least one row and retry")]
    EmptySelection,

    #[error("a bulk update is already in flight -- wait for it to finish")]
    BulkInFlight,

    #[error("no bulk update is pending")]
    NoBulkPending,

    #[error("{value:?} is not an allowed value for {field}")]
    ValueOutOfDomain { field: String, value: String },

    #[error("cannot {action} the {kind:?} dialog while it is {phase}")]
    InvalidModalTransition {
        kind: Option<ModalKind>,
        action: &'static str,
        phase: &'static str,
    },

    #[error("real-time patch payload is invalid: {0}")]
    InvalidPatch(String),

    #[error("list view has been torn down")]
    TornDown,
}
