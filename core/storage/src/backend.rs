//! Store backend trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use passdeck_common::{EntryPath, Result, SecretValue};

/// Kind of backend call, used for logging and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendOp {
    List,
    Read,
    Write,
    Remove,
    Copy,
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendOp::List => "list",
            BackendOp::Read => "read",
            BackendOp::Write => "write",
            BackendOp::Remove => "remove",
            BackendOp::Copy => "copy",
        };
        f.write_str(name)
    }
}

/// Trusted collaborator that owns the encrypted store.
///
/// Implementations perform all decryption, encryption and file handling;
/// callers only ever see logical entry paths and plaintext. Every call may
/// block on an external process, so all operations are async. Failures are
/// reported as `Error::Backend` carrying the backend's own message.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Get the backend name (e.g., "pass", "memory").
    fn name(&self) -> &str;

    /// Full recursive listing of every entry (leaf) in the store.
    ///
    /// Directories are implied by the entries beneath them.
    async fn list(&self) -> Result<Vec<EntryPath>>;

    /// Decrypt one entry.
    ///
    /// # Errors
    /// - Entry missing or not decryptable
    async fn read(&self, path: &EntryPath) -> Result<SecretValue>;

    /// Encrypt and write one entry, creating parent directories as needed.
    ///
    /// Overwrites an existing entry at the same path.
    async fn write(&self, path: &EntryPath, content: &SecretValue) -> Result<()>;

    /// Remove an entry, or a directory with everything beneath it.
    async fn remove(&self, path: &EntryPath) -> Result<()>;

    /// Copy an entry to a new path.
    ///
    /// With `overwrite`, an existing entry at `to` is replaced in place.
    ///
    /// # Errors
    /// - Source missing
    /// - Destination already exists and `overwrite` is false
    async fn copy(&self, from: &EntryPath, to: &EntryPath, overwrite: bool) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_op_display() {
        assert_eq!(BackendOp::Copy.to_string(), "copy");
        assert_eq!(BackendOp::List.to_string(), "list");
    }

    #[test]
    fn test_backend_op_serialization() {
        let json = serde_json::to_string(&BackendOp::Remove).unwrap();
        let restored: BackendOp = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, BackendOp::Remove);
    }
}
