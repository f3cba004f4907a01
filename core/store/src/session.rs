//! Store session: the explicitly owned root of all store state.
//!
//! A session pairs one backend with the tree derived from it and the gate
//! that admits a single mutation at a time. Nothing here is global; a
//! front-end holds the session and hands out references.

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::TreeOptions;
use crate::engine::MutationEngine;
use crate::filter::FilterIndex;
use crate::tree::{ChildEntry, StoreTree};
use passdeck_common::{EntryPath, Result};
use passdeck_storage::StoreBackend;

/// Session handle for telling sessions apart in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Generate a new unique session handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Open password store.
pub struct StoreSession {
    handle: SessionHandle,
    backend: Arc<dyn StoreBackend>,
    tree: Arc<RwLock<StoreTree>>,
    gate: Mutex<()>,
}

impl StoreSession {
    /// Open a session and load the tree from the backend.
    ///
    /// # Errors
    /// - `Backend` if the store cannot be listed
    /// - `MalformedPath` if the listing does not form a valid tree
    pub async fn open(backend: Arc<dyn StoreBackend>, options: TreeOptions) -> Result<Self> {
        let session = Self {
            handle: SessionHandle::new(),
            backend,
            tree: Arc::new(RwLock::new(StoreTree::new(options))),
            gate: Mutex::new(()),
        };
        session.rebuild().await?;

        let entries = session.tree.read().await.leaf_count();
        info!(
            session = session.handle.as_str(),
            backend = session.backend.name(),
            entries,
            "Store session opened"
        );
        Ok(session)
    }

    /// Get the session handle.
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Get the backend.
    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// Read access to the current tree.
    pub async fn tree(&self) -> RwLockReadGuard<'_, StoreTree> {
        self.tree.read().await
    }

    /// Engine that fails with `Busy` while another mutation runs.
    pub fn engine(&self) -> MutationEngine<'_> {
        MutationEngine::new(self, false)
    }

    /// Engine that queues behind a running mutation instead of failing.
    pub(crate) fn waiting_engine(&self) -> MutationEngine<'_> {
        MutationEngine::new(self, true)
    }

    pub(crate) fn gate(&self) -> &Mutex<()> {
        &self.gate
    }

    /// Replace the tree with one built from a fresh backend listing.
    ///
    /// Leaves the previous tree in place if the listing is rejected.
    pub(crate) async fn rebuild(&self) -> Result<()> {
        let listing = self.backend.list().await?;
        let count = listing.len();
        self.tree.write().await.rebuild(listing)?;
        debug!(session = self.handle.as_str(), entries = count, "Tree rebuilt");
        Ok(())
    }

    /// Resolve a path and report whether it is an entry.
    pub async fn is_leaf(&self, path: &EntryPath) -> bool {
        self.tree.read().await.is_leaf(path)
    }

    /// Check if a path exists.
    pub async fn contains(&self, path: &EntryPath) -> bool {
        self.tree.read().await.contains(path)
    }

    /// Immediate children of a directory.
    pub async fn children_of(&self, path: &EntryPath) -> Result<Vec<ChildEntry>> {
        self.tree.read().await.children_of(path)
    }

    /// Entries matching the index's query, in tree order.
    pub async fn filter(&self, index: &FilterIndex) -> Vec<EntryPath> {
        let tree = self.tree.read().await;
        index.view(&tree).matches()
    }
}

impl std::fmt::Debug for StoreSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSession")
            .field("handle", &self.handle)
            .field("backend", &self.backend.name())
            .finish()
    }
}
