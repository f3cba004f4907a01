//! Confirmation tokens for irreversible mutations.

use serde::{Deserialize, Serialize};
use std::fmt;

use passdeck_common::EntryPath;

/// Irreversible action a caller can authorise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmedAction {
    /// Remove an entry or a whole directory.
    Delete,
    /// Replace an existing entry during a rename.
    Overwrite,
}

impl fmt::Display for ConfirmedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmedAction::Delete => write!(f, "delete"),
            ConfirmedAction::Overwrite => write!(f, "overwrite"),
        }
    }
}

/// Caller-issued authorisation for one action on one exact path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    action: ConfirmedAction,
    path: EntryPath,
}

impl Confirmation {
    /// Authorise deleting `path`.
    pub fn delete(path: &EntryPath) -> Self {
        Self {
            action: ConfirmedAction::Delete,
            path: path.clone(),
        }
    }

    /// Authorise overwriting `path`.
    pub fn overwrite(path: &EntryPath) -> Self {
        Self {
            action: ConfirmedAction::Overwrite,
            path: path.clone(),
        }
    }

    /// True if this token covers `action` on exactly `path`.
    pub fn authorizes(&self, action: ConfirmedAction, path: &EntryPath) -> bool {
        self.action == action && &self.path == path
    }
}
