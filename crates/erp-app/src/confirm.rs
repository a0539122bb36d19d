// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::debug;

use crate::ids::RowId;

/// A destructive action waiting for the user to confirm by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmDelete {
    pub target: RowId,
    pub name: String,
    pub text: String,
    /// Path the delete is posted to.
    pub action: String,
}

impl ConfirmDelete {
    pub fn new(target: impl Into<RowId>, name: impl Into<String>, action: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            target: target.into(),
            text: format!("Are you sure you want to delete {name}? This cannot be undone."),
            name,
            action: action.into(),
        }
    }

    /// Whether the typed confirmation echoes the name.
    pub fn accepts(&self, typed: &str) -> bool {
        typed.trim() == self.name.trim()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub id: RowId,
    pub action: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteDialog {
    open: Option<ConfirmDelete>,
    selected_row: Option<RowId>,
}

impl DeleteDialog {
    pub fn open(&mut self, confirm: ConfirmDelete) {
        self.selected_row = Some(confirm.target.clone());
        self.open = Some(confirm);
    }

    pub fn current(&self) -> Option<&ConfirmDelete> {
        self.open.as_ref()
    }

    pub fn selected_row(&self) -> Option<&str> {
        self.selected_row.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(confirm) = self.open.take() {
            debug!(target = %confirm.target, "delete cancelled");
        }
        self.selected_row = None;
    }

    /// Closes the dialog and yields the request to send, if one was open.
    pub fn submit(&mut self) -> Option<DeleteRequest> {
        self.selected_row = None;
        self.open.take().map(|confirm| DeleteRequest {
            id: confirm.target,
            action: confirm.action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfirmDelete, DeleteDialog};

    #[test]
    fn text_echoes_the_name() {
        let confirm = ConfirmDelete::new("P1", "Widget", "/x/items/P1/delete");
        assert!(confirm.text.contains("Widget"));
        assert!(confirm.accepts(" Widget"));
        assert!(!confirm.accepts("widget"));
    }

    #[test]
    fn cancel_clears_dialog_and_selected_row() {
        let mut dialog = DeleteDialog::default();
        dialog.open(ConfirmDelete::new("P1", "Widget", "/x/items/P1/delete"));
        assert_eq!(dialog.selected_row(), Some("P1"));

        dialog.cancel();
        assert!(!dialog.is_open());
        assert_eq!(dialog.selected_row(), None);
        assert_eq!(dialog.submit(), None);
    }

    #[test]
    fn submit_yields_request_once() {
        let mut dialog = DeleteDialog::default();
        dialog.open(ConfirmDelete::new("P1", "Widget", "/x/items/P1/delete"));
        let request = dialog.submit().expect("request");
        assert_eq!(request.id, "P1");
        assert_eq!(request.action, "/x/items/P1/delete");
        assert_eq!(dialog.submit(), None);
        assert_eq!(dialog.selected_row(), None);
    }
}
