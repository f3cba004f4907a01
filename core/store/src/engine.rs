//! Store mutations.
//!
//! Every operation validates against the current tree, performs its backend
//! steps, then rebuilds the tree from a fresh listing. Backend failures are
//! returned as they were reported; nothing is retried.

use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

use crate::confirm::{Confirmation, ConfirmedAction};
use crate::session::StoreSession;
use passdeck_common::{EntryPath, Error, Result, SecretValue};
use passdeck_secret::PendingSecret;

/// Mutation front-end of a store session.
pub struct MutationEngine<'a> {
    session: &'a StoreSession,
    /// Wait for the gate instead of failing with `Busy`.
    wait: bool,
}

impl<'a> MutationEngine<'a> {
    pub(crate) fn new(session: &'a StoreSession, wait: bool) -> Self {
        Self { session, wait }
    }

    async fn acquire(&self) -> Result<MutexGuard<'a, ()>> {
        let gate = self.session.gate();
        if self.wait {
            Ok(gate.lock().await)
        } else {
            gate.try_lock().map_err(|_| Error::Busy)
        }
    }

    /// Rebuild after backend steps, reporting the step's error first.
    async fn finish(&self, result: Result<()>) -> Result<()> {
        let rebuilt = self.session.rebuild().await;
        result?;
        rebuilt
    }

    /// Create a new entry.
    ///
    /// # Errors
    /// - `MalformedPath` for the store root
    /// - `AlreadyExists` if the path is an entry or a directory
    /// - `NotADirectory` if an ancestor of the path is an entry
    /// - `Backend` if the write fails
    pub async fn create(&self, path: &EntryPath, content: &SecretValue) -> Result<()> {
        let _guard = self.acquire().await?;
        debug!(path = %path, "Creating entry");

        if path.is_root() {
            return Err(Error::MalformedPath(
                "cannot create an entry at the store root".to_string(),
            ));
        }
        {
            let tree = self.session.tree().await;
            if tree.contains(path) {
                return Err(Error::AlreadyExists(path.to_string()));
            }
            if let Some(leaf) = tree.leaf_ancestor(path) {
                return Err(Error::NotADirectory(leaf.to_string()));
            }
        }

        let result = self.session.backend().write(path, content).await;
        self.finish(result).await?;

        info!(path = %path, "Entry created");
        Ok(())
    }

    /// Replace the content of an existing entry.
    ///
    /// # Errors
    /// - `NotFound` unless the path is an entry
    /// - `Backend` if the write fails
    pub async fn update(&self, path: &EntryPath, content: &SecretValue) -> Result<()> {
        let _guard = self.acquire().await?;
        debug!(path = %path, "Updating entry");

        if !self.session.tree().await.is_leaf(path) {
            return Err(Error::NotFound(path.to_string()));
        }

        let result = self.session.backend().write(path, content).await;
        self.finish(result).await?;

        info!(path = %path, "Entry updated");
        Ok(())
    }

    /// Move an entry to a new path by copying then deleting.
    ///
    /// An existing entry at `new` is replaced only with an overwrite
    /// confirmation naming `new`.
    ///
    /// # Errors
    /// - `NotFound` unless `old` is an entry
    /// - `InvalidInput` if both paths name the same node
    /// - `MalformedPath` if `new` is the store root
    /// - `NotADirectory` if an ancestor of `new` is an entry
    /// - `AlreadyExists` if `new` exists and may not be replaced
    /// - `PartialRename` if the copy landed but `old` could not be removed
    /// - `Backend` for any other backend failure
    pub async fn rename(
        &self,
        old: &EntryPath,
        new: &EntryPath,
        overwrite: Option<&Confirmation>,
    ) -> Result<()> {
        let _guard = self.acquire().await?;
        debug!(from = %old, to = %new, "Renaming entry");

        let replace = {
            let tree = self.session.tree().await;
            if !tree.is_leaf(old) {
                return Err(Error::NotFound(old.to_string()));
            }
            if tree.options().key(old) == tree.options().key(new) {
                return Err(Error::InvalidInput(format!(
                    "'{}' and '{}' name the same entry",
                    old, new
                )));
            }
            if new.is_root() {
                return Err(Error::MalformedPath(
                    "cannot rename an entry to the store root".to_string(),
                ));
            }
            if let Some(leaf) = tree.leaf_ancestor(new) {
                return Err(Error::NotADirectory(leaf.to_string()));
            }

            if tree.contains(new) {
                let confirmed = overwrite
                    .map(|c| c.authorizes(ConfirmedAction::Overwrite, new))
                    .unwrap_or(false);
                if !confirmed || !tree.is_leaf(new) {
                    return Err(Error::AlreadyExists(new.to_string()));
                }
                true
            } else {
                false
            }
        };

        let backend = self.session.backend();

        if let Err(e) = backend.copy(old, new, replace).await {
            return self.finish(Err(e)).await;
        }

        if let Err(e) = backend.remove(old).await {
            warn!(
                from = %old,
                to = %new,
                error = %e,
                "Rename copied entry but left the original"
            );
            let mut detail = e.to_string();
            if let Err(rebuild) = self.session.rebuild().await {
                warn!(error = %rebuild, "Tree rebuild after partial rename failed");
                detail = format!("{}; tree not refreshed: {}", detail, rebuild);
            }
            return Err(Error::PartialRename {
                original: old.clone(),
                copy: new.clone(),
                detail,
            });
        }

        self.finish(Ok(())).await?;
        info!(from = %old, to = %new, "Entry renamed");
        Ok(())
    }

    /// Delete an entry, or a directory with everything beneath it.
    ///
    /// # Errors
    /// - `InvalidInput` for the store root
    /// - `NotFound` if the path does not exist
    /// - `ConfirmationRequired` without a delete confirmation naming `path`
    /// - `Backend` if the removal fails
    pub async fn delete(
        &self,
        path: &EntryPath,
        confirmation: Option<&Confirmation>,
    ) -> Result<()> {
        let _guard = self.acquire().await?;
        debug!(path = %path, "Deleting");

        if path.is_root() {
            return Err(Error::InvalidInput(
                "refusing to delete the store root".to_string(),
            ));
        }
        if !self.session.tree().await.contains(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        let confirmed = confirmation
            .map(|c| c.authorizes(ConfirmedAction::Delete, path))
            .unwrap_or(false);
        if !confirmed {
            return Err(Error::ConfirmationRequired(path.to_string()));
        }

        let result = self.session.backend().remove(path).await;
        self.finish(result).await?;

        info!(path = %path, "Deleted");
        Ok(())
    }

    /// Decrypt an entry.
    ///
    /// Reads do not take the mutation gate.
    ///
    /// # Errors
    /// - `NotFound` unless the path is an entry
    /// - `Backend` if decryption fails
    pub async fn open(&self, path: &EntryPath) -> Result<PendingSecret> {
        if !self.session.tree().await.is_leaf(path) {
            return Err(Error::NotFound(path.to_string()));
        }

        let value = self.session.backend().read(path).await?;
        debug!(path = %path, "Entry opened");
        Ok(PendingSecret::from_entry(path.clone(), value))
    }

    /// Rebuild the tree without mutating, picking up out-of-band changes.
    pub async fn refresh(&self) -> Result<()> {
        let _guard = self.acquire().await?;
        self.session.rebuild().await
    }
}
