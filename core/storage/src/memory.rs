//! In-memory store backend for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::backend::{BackendOp, StoreBackend};
use passdeck_common::{EntryPath, Error, Result, SecretValue};

#[derive(Default)]
struct State {
    entries: BTreeMap<EntryPath, SecretValue>,
    /// Injected failures; `None` path matches every call of that kind.
    failures: Vec<(BackendOp, Option<EntryPath>)>,
    calls: HashMap<BackendOp, usize>,
}

/// In-memory store backend.
///
/// Useful for testing and development. Entries are held as plaintext in
/// memory and lost on drop. Directories exist implicitly while any entry
/// lives beneath them, matching how a pass store behaves on disk.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<RwLock<State>>,
    latency: Option<Duration>,
}

impl MemoryBackend {
    /// Create a new empty memory backend.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            latency: None,
        }
    }

    /// Create a backend pre-populated with `(path, content)` pairs.
    ///
    /// # Errors
    /// - `MalformedPath` if any path does not parse
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let backend = Self::new();
        {
            let mut state = backend.lock_write()?;
            for (path, content) in entries {
                state
                    .entries
                    .insert(EntryPath::parse(path)?, SecretValue::from(content));
            }
        }
        Ok(backend)
    }

    /// Delay every mutating call by `latency`, simulating a slow gpg run.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make calls of kind `op` fail; restricted to `path` when given.
    pub fn fail_on(&self, op: BackendOp, path: Option<&EntryPath>) {
        if let Ok(mut state) = self.state.write() {
            state.failures.push((op, path.cloned()));
        }
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.state.write() {
            state.failures.clear();
        }
    }

    /// Number of calls of kind `op` received so far.
    pub fn call_count(&self, op: BackendOp) -> usize {
        self.state
            .read()
            .map(|state| state.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Snapshot of all entry paths, sorted.
    pub fn paths(&self) -> Vec<EntryPath> {
        self.state
            .read()
            .map(|state| state.entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| Error::Backend("memory backend lock poisoned".to_string()))
    }

    /// Record the call and apply any injected failure.
    fn enter(&self, op: BackendOp, path: Option<&EntryPath>) -> Result<()> {
        let mut state = self.lock_write()?;
        *state.calls.entry(op).or_insert(0) += 1;

        let injected = state.failures.iter().any(|(fail_op, fail_path)| {
            *fail_op == op
                && match (fail_path, path) {
                    (None, _) => true,
                    (Some(expected), Some(actual)) => expected == actual,
                    (Some(_), None) => false,
                }
        });
        if injected {
            let target = path.map(|p| p.to_string()).unwrap_or_default();
            return Err(Error::Backend(format!("injected {} failure {}", op, target)));
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn not_in_store(path: &EntryPath) -> Error {
    Error::Backend(format!("{} is not in the password store", path))
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self) -> Result<Vec<EntryPath>> {
        self.enter(BackendOp::List, None)?;
        Ok(self.paths())
    }

    async fn read(&self, path: &EntryPath) -> Result<SecretValue> {
        self.enter(BackendOp::Read, Some(path))?;
        let state = self
            .state
            .read()
            .map_err(|_| Error::Backend("memory backend lock poisoned".to_string()))?;
        state
            .entries
            .get(path)
            .cloned()
            .ok_or_else(|| not_in_store(path))
    }

    async fn write(&self, path: &EntryPath, content: &SecretValue) -> Result<()> {
        self.enter(BackendOp::Write, Some(path))?;
        self.simulate_latency().await;

        if path.is_root() {
            return Err(Error::Backend("cannot write the store root".to_string()));
        }

        let mut state = self.lock_write()?;
        if let Some(leaf) = path.ancestors().into_iter().find(|a| state.entries.contains_key(a)) {
            return Err(Error::Backend(format!("{} is an entry, not a directory", leaf)));
        }
        if state.entries.keys().any(|existing| path.is_ancestor_of(existing)) {
            return Err(Error::Backend(format!("{} is a directory", path)));
        }

        state.entries.insert(path.clone(), content.clone());
        Ok(())
    }

    async fn remove(&self, path: &EntryPath) -> Result<()> {
        self.enter(BackendOp::Remove, Some(path))?;
        self.simulate_latency().await;

        let mut state = self.lock_write()?;
        if state.entries.remove(path).is_some() {
            return Ok(());
        }

        let before = state.entries.len();
        state.entries.retain(|existing, _| !path.is_ancestor_of(existing));
        if state.entries.len() == before {
            return Err(not_in_store(path));
        }
        Ok(())
    }

    async fn copy(&self, from: &EntryPath, to: &EntryPath, overwrite: bool) -> Result<()> {
        self.enter(BackendOp::Copy, Some(from))?;
        self.simulate_latency().await;

        let mut state = self.lock_write()?;
        if !overwrite && state.entries.contains_key(to) {
            return Err(Error::Backend(format!("{} already exists", to)));
        }

        let content = state
            .entries
            .get(from)
            .cloned()
            .ok_or_else(|| not_in_store(from))?;
        state.entries.insert(to.clone(), content);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> EntryPath {
        EntryPath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_write_read() {
        let backend = MemoryBackend::new();
        let p = path("web/github");

        backend.write(&p, &SecretValue::from("s3cret\nuser: me")).await.unwrap();
        let content = backend.read(&p).await.unwrap();

        assert_eq!(content.as_str().unwrap(), "s3cret\nuser: me");
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let backend =
            MemoryBackend::with_entries([("b/two", "2"), ("a/one", "1"), ("c", "3")]).unwrap();

        let listing = backend.list().await.unwrap();
        let names: Vec<String> = listing.iter().map(|p| p.as_normalized()).collect();
        assert_eq!(names, vec!["a/one", "b/two", "c"]);
    }

    #[tokio::test]
    async fn test_remove_directory_is_recursive() {
        let backend =
            MemoryBackend::with_entries([("mail/a", "1"), ("mail/b", "2"), ("web", "3")]).unwrap();

        backend.remove(&path("mail")).await.unwrap();

        assert_eq!(backend.paths(), vec![path("web")]);
    }

    #[tokio::test]
    async fn test_remove_missing_fails() {
        let backend = MemoryBackend::new();
        let err = backend.remove(&path("nope")).await.unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }

    #[tokio::test]
    async fn test_write_under_leaf_fails() {
        let backend = MemoryBackend::with_entries([("web", "1")]).unwrap();
        let err = backend
            .write(&path("web/github"), &SecretValue::from("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }

    #[tokio::test]
    async fn test_copy() {
        let backend = MemoryBackend::with_entries([("old", "pw")]).unwrap();

        backend.copy(&path("old"), &path("new"), false).await.unwrap();

        assert_eq!(backend.read(&path("new")).await.unwrap().as_str().unwrap(), "pw");
        assert!(backend.read(&path("old")).await.is_ok());
        assert!(backend.copy(&path("old"), &path("new"), false).await.is_err());
    }

    #[tokio::test]
    async fn test_copy_overwrite_replaces_destination() {
        let backend = MemoryBackend::with_entries([("old", "pw"), ("new", "stale")]).unwrap();

        backend.copy(&path("old"), &path("new"), true).await.unwrap();

        assert_eq!(backend.read(&path("new")).await.unwrap().as_str().unwrap(), "pw");
        assert_eq!(backend.paths(), vec![path("new"), path("old")]);
    }

    #[tokio::test]
    async fn test_injected_failure_is_scoped_to_path() {
        let backend = MemoryBackend::with_entries([("a", "1"), ("b", "2")]).unwrap();
        backend.fail_on(BackendOp::Remove, Some(&path("a")));

        assert!(backend.remove(&path("a")).await.is_err());
        assert!(backend.remove(&path("b")).await.is_ok());
        assert_eq!(backend.call_count(BackendOp::Remove), 2);

        backend.clear_failures();
        assert!(backend.remove(&path("a")).await.is_ok());
    }
}
