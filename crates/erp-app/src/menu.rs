// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::bulk::BulkUpdateRequest;
use crate::confirm::ConfirmDelete;
use crate::ids::RowId;
use crate::modal::ModalKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuIcon {
    Edit,
    Delete,
    Version,
    Permissions,
    Invite,
    Deactivate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    Navigate(String),
    ConfirmDelete(ConfirmDelete),
    OpenModal { kind: ModalKind, targets: Vec<RowId> },
    /// Applies `value` to `field` on every selected row.
    BulkUpdate { field: &'static str, value: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub icon: Option<MenuIcon>,
    pub command: MenuCommand,
    pub enabled: bool,
    pub destructive: bool,
}

impl MenuItem {
    pub fn new(label: impl Into<String>, command: MenuCommand) -> Self {
        Self {
            label: label.into(),
            icon: None,
            command,
            enabled: true,
            destructive: false,
        }
    }

    pub fn icon(mut self, icon: MenuIcon) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }

    /// Disabled items stay visible so the action remains discoverable.
    pub fn enabled_if(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Item(MenuItem),
    Submenu { label: String, items: Vec<MenuItem> },
    Separator,
}

impl MenuEntry {
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Item(item) => Some(&item.label),
            Self::Submenu { label, .. } => Some(label),
            Self::Separator => None,
        }
    }
}

/// Every activatable item, submenu children included, in display order.
pub fn flatten(entries: &[MenuEntry]) -> Vec<&MenuItem> {
    let mut items = Vec::new();
    for entry in entries {
        match entry {
            MenuEntry::Item(item) => items.push(item),
            MenuEntry::Submenu { items: children, .. } => items.extend(children.iter()),
            MenuEntry::Separator => {}
        }
    }
    items
}

pub fn find_item<'a>(entries: &'a [MenuEntry], label: &str) -> Option<&'a MenuItem> {
    flatten(entries).into_iter().find(|item| item.label == label)
}

/// Result of activating a menu item or bulk action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Navigate(String),
    ConfirmOpened,
    ModalOpened(ModalKind),
    BulkSubmitted(BulkUpdateRequest),
    Blocked,
}

#[cfg(test)]
mod tests {
    use super::{MenuCommand, MenuEntry, MenuItem, find_item, flatten};

    #[test]
    fn flatten_includes_submenu_children() {
        let entries = vec![
            MenuEntry::Item(MenuItem::new("Edit", MenuCommand::Navigate("/a".to_owned()))),
            MenuEntry::Separator,
            MenuEntry::Submenu {
                label: "Versions".to_owned(),
                items: vec![MenuItem::new(
                    "Revision 2",
                    MenuCommand::Navigate("/b".to_owned()),
                )],
            },
        ];
        assert_eq!(flatten(&entries).len(), 2);
        assert!(find_item(&entries, "Revision 2").is_some());
        assert!(find_item(&entries, "Versions").is_none());
    }
}
