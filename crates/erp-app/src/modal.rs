// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use tracing::debug;

use std::collections::BTreeSet;

use crate::error::ListError;
use crate::ids::RowId;
use crate::permissions::Capability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModalKind {
    EditPermissions,
    DeactivateUsers,
    ResendInvite,
    RevokeInvite,
}

impl ModalKind {
    pub const ALL: [Self; 4] = [
        Self::EditPermissions,
        Self::DeactivateUsers,
        Self::ResendInvite,
        Self::RevokeInvite,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EditPermissions => "edit-permissions",
            Self::DeactivateUsers => "deactivate-users",
            Self::ResendInvite => "resend-invite",
            Self::RevokeInvite => "revoke-invite",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::EditPermissions => "Edit Permissions",
            Self::DeactivateUsers => "Deactivate Users",
            Self::ResendInvite => "Resend Invite",
            Self::RevokeInvite => "Revoke Invite",
        }
    }

    pub const fn confirm_label(self) -> &'static str {
        match self {
            Self::EditPermissions => "Save",
            Self::DeactivateUsers => "Deactivate",
            Self::ResendInvite => "Resend",
            Self::RevokeInvite => "Revoke",
        }
    }

    pub const fn is_destructive(self) -> bool {
        matches!(self, Self::DeactivateUsers | Self::RevokeInvite)
    }
}

/// Payload submitted when a dialog is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalAction {
    pub kind: ModalKind,
    pub identifiers: Vec<RowId>,
    /// Replacement capability set; only meaningful for permission edits.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub capabilities: BTreeSet<Capability>,
}

impl ModalAction {
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ModalState {
    #[default]
    Closed,
    Open {
        kind: ModalKind,
        targets: Vec<RowId>,
    },
    Submitting {
        kind: ModalKind,
        targets: Vec<RowId>,
    },
}

impl ModalState {
    pub const fn phase(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open { .. } => "open",
            Self::Submitting { .. } => "submitting",
        }
    }

    pub fn kind(&self) -> Option<ModalKind> {
        match self {
            Self::Closed => None,
            Self::Open { kind, .. } | Self::Submitting { kind, .. } => Some(*kind),
        }
    }

    pub fn targets(&self) -> &[RowId] {
        match self {
            Self::Closed => &[],
            Self::Open { targets, .. } | Self::Submitting { targets, .. } => targets,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    fn invalid(&self, action: &'static str) -> ListError {
        ListError::InvalidModalTransition {
            kind: self.kind(),
            action,
            phase: self.phase(),
        }
    }

    /// Opening over an open dialog replaces its targets; opening while
    /// submitting is rejected.
    pub fn open(&mut self, kind: ModalKind, targets: Vec<RowId>) -> Result<(), ListError> {
        if matches!(self, Self::Submitting { .. }) {
            return Err(self.invalid("open"));
        }
        if targets.is_empty() {
            return Err(ListError::EmptySelection);
        }
        debug!(kind = kind.as_str(), targets = targets.len(), "modal opened");
        *self = Self::Open { kind, targets };
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), ListError> {
        match self {
            Self::Open { .. } => {
                *self = Self::Closed;
                Ok(())
            }
            _ => Err(self.invalid("cancel")),
        }
    }

    pub fn begin_submit(&mut self) -> Result<ModalAction, ListError> {
        match std::mem::take(self) {
            Self::Open { kind, targets } => {
                let action = ModalAction {
                    kind,
                    identifiers: targets.clone(),
                    capabilities: BTreeSet::new(),
                };
                *self = Self::Submitting { kind, targets };
                Ok(action)
            }
            other => {
                *self = other;
                Err(self.invalid("submit"))
            }
        }
    }

    pub fn succeed(&mut self) -> Result<(), ListError> {
        match self {
            Self::Submitting { .. } => {
                *self = Self::Closed;
                Ok(())
            }
            _ => Err(self.invalid("finish")),
        }
    }

    /// A failed submission returns to the open dialog with the same targets.
    pub fn fail(&mut self) -> Result<(), ListError> {
        match std::mem::take(self) {
            Self::Submitting { kind, targets } => {
                *self = Self::Open { kind, targets };
                Ok(())
            }
            other => {
                *self = other;
                Err(self.invalid("fail"))
            }
        }
    }

    /// Unconditional close, used on teardown.
    pub fn reset(&mut self) {
        *self = Self::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::{ModalKind, ModalState};
    use crate::ListError;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn full_cycle_clears_targets() -> anyhow::Result<()> {
        let mut modal = ModalState::default();
        modal.open(ModalKind::DeactivateUsers, ids(&["E1", "E2"]))?;
        assert_eq!(modal.targets(), ids(&["E1", "E2"]).as_slice());

        let action = modal.begin_submit()?;
        assert_eq!(action.identifiers, ids(&["E1", "E2"]));
        assert_eq!(modal.phase(), "submitting");

        modal.succeed()?;
        assert_eq!(modal, ModalState::Closed);
        assert!(modal.targets().is_empty());
        Ok(())
    }

    #[test]
    fn reopen_does_not_keep_stale_targets() -> anyhow::Result<()> {
        let mut modal = ModalState::default();
        modal.open(ModalKind::ResendInvite, ids(&["E1"]))?;
        modal.cancel()?;
        modal.open(ModalKind::ResendInvite, ids(&["E3"]))?;
        assert_eq!(modal.targets(), ids(&["E3"]).as_slice());
        Ok(())
    }

    #[test]
    fn failure_returns_to_open() -> anyhow::Result<()> {
        let mut modal = ModalState::default();
        modal.open(ModalKind::RevokeInvite, ids(&["E1"]))?;
        modal.begin_submit()?;
        modal.fail()?;
        assert_eq!(modal.phase(), "open");
        assert_eq!(modal.kind(), Some(ModalKind::RevokeInvite));
        Ok(())
    }

    #[test]
    fn invalid_transitions_are_rejected() -> anyhow::Result<()> {
        let mut modal = ModalState::default();
        assert!(matches!(
            modal.cancel(),
            Err(ListError::InvalidModalTransition { phase: "closed", .. })
        ));
        assert!(modal.begin_submit().is_err());
        assert_eq!(modal, ModalState::Closed);

        modal.open(ModalKind::EditPermissions, ids(&["E1"]))?;
        modal.begin_submit()?;
        assert!(modal.open(ModalKind::EditPermissions, ids(&["E2"])).is_err());
        assert!(modal.cancel().is_err());
        assert_eq!(modal.targets(), ids(&["E1"]).as_slice());
        Ok(())
    }
}
