//! Common error types for passdeck.

use thiserror::Error;

use crate::types::EntryPath;

/// Top-level error type for password-store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A path string or listing entry is not a valid store path.
    #[error("Malformed path: {0}")]
    MalformedPath(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Path resolves to a leaf where a directory was required.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Rename copied the entry but could not remove the original.
    ///
    /// Both paths are live in the store until the caller reconciles them.
    #[error("Partial rename: '{copy}' was created but '{original}' could not be removed: {detail}")]
    PartialRename {
        /// The original entry, still present.
        original: EntryPath,
        /// The new copy.
        copy: EntryPath,
        /// Backend failure reported by the delete step.
        detail: String,
    },

    /// The store backend reported a failure.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Requested secret length is out of range.
    #[error("Invalid length: {0}")]
    InvalidLength(String),

    /// Another mutation is already in flight.
    #[error("Busy: another store mutation is in progress")]
    Busy,

    /// An irreversible operation was attempted without a matching confirmation.
    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The mutation queue worker is no longer running.
    #[error("Mutation queue is closed")]
    QueueClosed,

    /// Clipboard access failed.
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Short, stable name of the error kind for rendering in a UI.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MalformedPath(_) => "MalformedPath",
            Error::NotFound(_) => "NotFound",
            Error::AlreadyExists(_) => "AlreadyExists",
            Error::NotADirectory(_) => "NotADirectory",
            Error::PartialRename { .. } => "PartialRename",
            Error::Backend(_) => "BackendError",
            Error::InvalidLength(_) => "InvalidLength",
            Error::Busy => "Busy",
            Error::ConfirmationRequired(_) => "ConfirmationRequired",
            Error::InvalidInput(_) => "InvalidInput",
            Error::QueueClosed => "QueueClosed",
            Error::Clipboard(_) => "Clipboard",
            Error::Io(_) => "Io",
            Error::Serialization(_) => "Serialization",
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_rename_names_both_paths() {
        let err = Error::PartialRename {
            original: EntryPath::parse("web/old").unwrap(),
            copy: EntryPath::parse("web/new").unwrap(),
            detail: "permission denied".to_string(),
        };

        let message = err.to_string();
        assert!(message.contains("web/old"));
        assert!(message.contains("web/new"));
        assert!(message.contains("permission denied"));
        assert_eq!(err.kind(), "PartialRename");
    }

    #[test]
    fn test_backend_error_kind() {
        let err = Error::Backend("gpg: decryption failed".to_string());
        assert_eq!(err.kind(), "BackendError");
        assert_eq!(err.to_string(), "Backend error: gpg: decryption failed");
    }
}
