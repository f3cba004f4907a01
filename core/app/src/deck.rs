//! Application facade over one open password store.
//!
//! `PassDeck` is what a front-end talks to: tree queries and filtering,
//! queued mutations with confirmation, password generation, and the
//! clipboard exposure window.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::settings::Settings;
use passdeck_common::{EntryPath, Result, SecretValue};
use passdeck_secret::{generate, CharsetPolicy, Clipboard, ClipboardSession, PendingSecret};
use passdeck_storage::{create_default_registry, BackendRegistry, StoreBackend};
use passdeck_store::{
    ChildEntry, Confirmation, EntryContent, FilterIndex, Mutation, MutationQueue, StoreSession,
    DEFAULT_CAPACITY,
};

/// One open store plus the state a front-end needs around it.
pub struct PassDeck {
    settings: Settings,
    session: Arc<StoreSession>,
    queue: MutationQueue,
    worker: JoinHandle<()>,
    filter: Mutex<FilterIndex>,
    clipboard: ClipboardSession,
}

impl PassDeck {
    /// Open the store described by `settings` using the built-in backends.
    ///
    /// # Errors
    /// - `InvalidInput` if the settings are out of range
    /// - `NotFound` if the configured backend is unknown
    /// - `Backend` if the store cannot be listed
    pub async fn open(settings: Settings, clipboard: Arc<dyn Clipboard>) -> Result<Self> {
        Self::open_with_registry(settings, &create_default_registry(), clipboard).await
    }

    /// Open the store using backends from `registry`.
    pub async fn open_with_registry(
        settings: Settings,
        registry: &BackendRegistry,
        clipboard: Arc<dyn Clipboard>,
    ) -> Result<Self> {
        settings.validate()?;
        let backend = registry.resolve(&settings.backend, settings.backend_config())?;
        Self::with_backend(settings, backend, clipboard).await
    }

    /// Open a store over an already constructed backend.
    pub async fn with_backend(
        settings: Settings,
        backend: Arc<dyn StoreBackend>,
        clipboard: Arc<dyn Clipboard>,
    ) -> Result<Self> {
        let session = Arc::new(StoreSession::open(backend, settings.tree_options()).await?);
        let (queue, worker) = MutationQueue::new(Arc::clone(&session), DEFAULT_CAPACITY);
        let worker = tokio::spawn(worker.run());

        info!(
            session = session.handle().as_str(),
            store = %settings.store_dir.display(),
            "PassDeck ready"
        );

        Ok(Self {
            settings,
            session,
            queue,
            worker,
            filter: Mutex::new(FilterIndex::new()),
            clipboard: ClipboardSession::new(clipboard),
        })
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the store session.
    pub fn session(&self) -> &Arc<StoreSession> {
        &self.session
    }

    // ---- tree queries ----

    pub async fn children_of(&self, path: &EntryPath) -> Result<Vec<ChildEntry>> {
        self.session.children_of(path).await
    }

    pub async fn contains(&self, path: &EntryPath) -> bool {
        self.session.contains(path).await
    }

    pub async fn is_leaf(&self, path: &EntryPath) -> bool {
        self.session.is_leaf(path).await
    }

    /// Every entry in tree order.
    pub async fn entries(&self) -> Vec<EntryPath> {
        self.session
            .tree()
            .await
            .leaves()
            .map(|node| node.path().clone())
            .collect()
    }

    // ---- filtering ----

    /// Set the search query and return the matching entries.
    pub async fn set_filter(&self, query: &str) -> Vec<EntryPath> {
        let tree = self.session.tree().await;
        let mut filter = self.filter.lock().await;
        filter.set_query(&tree, query).matches()
    }

    /// Entries matching the current query against the current tree.
    pub async fn filtered(&self) -> Vec<EntryPath> {
        let tree = self.session.tree().await;
        let filter = self.filter.lock().await;
        filter.view(&tree).matches()
    }

    /// Directories to keep expanded so every match stays reachable.
    pub async fn filtered_directories(&self) -> Vec<EntryPath> {
        let tree = self.session.tree().await;
        let filter = self.filter.lock().await;
        filter.view(&tree).visible_directories().into_iter().collect()
    }

    // ---- mutations ----

    /// Create an entry.
    pub async fn create(&self, path: &EntryPath, content: &EntryContent) -> Result<()> {
        self.queue
            .submit(Mutation::Create {
                path: path.clone(),
                content: content.to_secret(),
            })
            .await
    }

    /// Replace an entry's content.
    pub async fn update(&self, path: &EntryPath, content: &EntryContent) -> Result<()> {
        self.queue
            .submit(Mutation::Update {
                path: path.clone(),
                content: content.to_secret(),
            })
            .await
    }

    /// Replace an entry's password, keeping its notes.
    pub async fn change_password(&self, path: &EntryPath, password: &str) -> Result<()> {
        let current = self.open_content(path).await?;
        let updated = current.with_password(password)?;
        self.update(path, &updated).await
    }

    /// Move an entry.
    pub async fn rename(
        &self,
        old: &EntryPath,
        new: &EntryPath,
        overwrite: Option<&Confirmation>,
    ) -> Result<()> {
        self.queue
            .submit(Mutation::Rename {
                from: old.clone(),
                to: new.clone(),
                overwrite: overwrite.cloned(),
            })
            .await
    }

    /// Delete an entry or directory.
    pub async fn delete(
        &self,
        path: &EntryPath,
        confirmation: Option<&Confirmation>,
    ) -> Result<()> {
        self.queue
            .submit(Mutation::Delete {
                path: path.clone(),
                confirmation: confirmation.cloned(),
            })
            .await
    }

    /// Pick up changes made outside this process.
    pub async fn refresh(&self) -> Result<()> {
        self.queue.submit(Mutation::Refresh).await
    }

    // ---- secrets ----

    /// Decrypt an entry.
    pub async fn open_entry(&self, path: &EntryPath) -> Result<PendingSecret> {
        self.session.engine().open(path).await
    }

    /// Decrypt an entry and split it into password and notes.
    pub async fn open_content(&self, path: &EntryPath) -> Result<EntryContent> {
        let secret = self.open_entry(path).await?;
        EntryContent::parse(secret.value())
    }

    /// Generate a password with the configured length and charset.
    pub fn generate_secret(&self) -> Result<PendingSecret> {
        self.generate_secret_with(self.settings.password_length, &self.settings.charset)
    }

    /// Generate a password with explicit parameters.
    pub fn generate_secret_with(
        &self,
        length: usize,
        policy: &CharsetPolicy,
    ) -> Result<PendingSecret> {
        Ok(PendingSecret::generated(generate(length, policy)?))
    }

    /// Create an entry holding a freshly generated password.
    pub async fn create_generated(&self, path: &EntryPath) -> Result<PendingSecret> {
        let secret = self.generate_secret()?;
        let content = EntryContent::compose(secret.value().as_str()?, "")?;
        self.create(path, &content).await?;
        Ok(secret)
    }

    // ---- clipboard ----

    /// Copy a secret for the configured TTL.
    pub fn copy_to_clipboard(&self, secret: &PendingSecret) -> Result<DateTime<Utc>> {
        self.copy_to_clipboard_for(secret, self.settings.clipboard_ttl())
    }

    /// Copy a secret, clearing it after `ttl`.
    pub fn copy_to_clipboard_for(
        &self,
        secret: &PendingSecret,
        ttl: Duration,
    ) -> Result<DateTime<Utc>> {
        self.clipboard.copy(secret, ttl)
    }

    /// Copy the password line of an entry.
    pub async fn copy_entry_password(&self, path: &EntryPath) -> Result<DateTime<Utc>> {
        let content = self.open_content(path).await?;
        let password = PendingSecret::from_entry(
            path.clone(),
            SecretValue::from(content.password()),
        );
        self.copy_to_clipboard(&password)
    }

    /// Wipe the clipboard now.
    pub fn clear_clipboard(&self) -> Result<()> {
        self.clipboard.clear_now()
    }

    /// Get the clipboard session.
    pub fn clipboard(&self) -> &ClipboardSession {
        &self.clipboard
    }

    /// Stop the mutation worker after queued requests finish.
    pub async fn close(self) {
        self.queue.shutdown().await;
        let _ = self.worker.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passdeck_common::Error;
    use passdeck_secret::{MemoryClipboard, SecretOrigin};
    use passdeck_storage::MemoryBackend;

    fn path(s: &str) -> EntryPath {
        EntryPath::parse(s).unwrap()
    }

    async fn deck(entries: &[(&str, &str)]) -> (PassDeck, MemoryBackend, Arc<MemoryClipboard>) {
        let backend = MemoryBackend::with_entries(entries.iter().copied()).unwrap();
        let clipboard = Arc::new(MemoryClipboard::new());
        let settings = Settings {
            backend: "memory".to_string(),
            ..Settings::default()
        };
        let deck = PassDeck::with_backend(settings, Arc::new(backend.clone()), clipboard.clone())
            .await
            .unwrap();
        (deck, backend, clipboard)
    }

    #[tokio::test]
    async fn test_open_with_registry() {
        let settings = Settings {
            backend: "memory".to_string(),
            ..Settings::default()
        };
        let deck = PassDeck::open(settings, Arc::new(MemoryClipboard::new()))
            .await
            .unwrap();
        assert!(deck.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_backend() {
        let settings = Settings {
            backend: "nope".to_string(),
            ..Settings::default()
        };
        let result = PassDeck::open(settings, Arc::new(MemoryClipboard::new())).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_filter_follows_mutations() {
        let (deck, _backend, _clipboard) = deck(&[("web/github", "a\n")]).await;

        assert_eq!(deck.set_filter("git").await, vec![path("web/github")]);

        let content = EntryContent::compose("pw", "").unwrap();
        deck.create(&path("web/gitlab"), &content).await.unwrap();

        assert_eq!(
            deck.filtered().await,
            vec![path("web/github"), path("web/gitlab")]
        );
        assert_eq!(deck.filtered_directories().await, vec![path("web")]);
    }

    #[tokio::test]
    async fn test_change_password_keeps_notes() {
        let (deck, _backend, _clipboard) = deck(&[("bank", "old\nuser: me")]).await;

        deck.change_password(&path("bank"), "new").await.unwrap();

        let content = deck.open_content(&path("bank")).await.unwrap();
        assert_eq!(content.password(), "new");
        assert_eq!(content.notes(), "user: me");
    }

    #[tokio::test]
    async fn test_copy_entry_password() {
        let (deck, _backend, clipboard) = deck(&[("bank", "s3cret\nuser: me")]).await;

        deck.copy_entry_password(&path("bank")).await.unwrap();
        assert_eq!(clipboard.contents(), "s3cret");
        assert_eq!(
            deck.clipboard().origin(),
            Some(SecretOrigin::Entry(path("bank")))
        );

        deck.clear_clipboard().unwrap();
        assert_eq!(clipboard.contents(), "");
    }

    #[tokio::test]
    async fn test_copy_with_explicit_ttl() {
        let (deck, _backend, clipboard) = deck(&[]).await;
        let secret = deck.generate_secret().unwrap();

        deck.copy_to_clipboard_for(&secret, Duration::from_millis(100))
            .unwrap();
        assert_eq!(clipboard.contents().len(), deck.settings().password_length);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(clipboard.contents(), "");
        assert!(!deck.clipboard().is_active());
    }

    #[tokio::test]
    async fn test_create_generated() {
        let (deck, backend, _clipboard) = deck(&[]).await;

        let secret = deck.create_generated(&path("new/site")).await.unwrap();
        assert_eq!(secret.value().len(), deck.settings().password_length);

        let stored = backend.read(&path("new/site")).await.unwrap();
        let content = EntryContent::parse(&stored).unwrap();
        assert_eq!(content.password().as_bytes(), secret.value().as_bytes());
    }

    #[tokio::test]
    async fn test_delete_needs_confirmation() {
        let (deck, _backend, _clipboard) = deck(&[("a/b", "x")]).await;

        let err = deck.delete(&path("a"), None).await.unwrap_err();
        assert!(matches!(err, Error::ConfirmationRequired(_)));

        deck.delete(&path("a"), Some(&Confirmation::delete(&path("a"))))
            .await
            .unwrap();
        assert!(!deck.contains(&path("a")).await);
    }

    #[tokio::test]
    async fn test_close_stops_worker() {
        let (deck, _backend, _clipboard) = deck(&[]).await;
        deck.close().await;
    }
}
