//! Store backend for a `pass`-compatible password store.
//!
//! The store is a directory of `*.gpg` files. Listing walks the directory
//! directly; everything that touches key material (decrypt, encrypt,
//! re-encrypt on copy, git bookkeeping) is delegated to the `pass` program.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::backend::StoreBackend;
use passdeck_common::{EntryPath, Error, Result, SecretValue};

/// File suffix of encrypted entries.
pub const ENTRY_SUFFIX: &str = ".gpg";

/// Environment variable `pass` reads the store location from.
pub const STORE_DIR_ENV: &str = "PASSWORD_STORE_DIR";

/// Result of one `pass` invocation.
#[derive(Debug, Clone)]
pub struct PassOutput {
    /// Exit status code.
    pub status_code: i32,
    /// Standard output.
    pub stdout: Vec<u8>,
    /// Standard error.
    pub stderr: String,
}

impl PassOutput {
    /// Convert a non-zero exit into a backend error carrying stderr.
    fn into_result(self, action: &str) -> Result<Vec<u8>> {
        if self.status_code == 0 {
            return Ok(self.stdout);
        }
        let detail = self.stderr.trim();
        if detail.is_empty() {
            Err(Error::Backend(format!(
                "pass {} exited with status {}",
                action, self.status_code
            )))
        } else {
            Err(Error::Backend(detail.to_string()))
        }
    }
}

/// Executor abstraction for `pass` commands.
#[async_trait]
pub trait PassExecutor: Send + Sync {
    /// Run pass against `store_dir` with `args`, feeding `stdin` if given.
    async fn exec(&self, store_dir: &Path, args: &[&str], stdin: Option<&[u8]>)
        -> Result<PassOutput>;
}

/// Real executor that spawns the system `pass` binary.
pub struct SystemPassExecutor {
    binary: String,
}

impl SystemPassExecutor {
    /// Creates a system executor using the `pass` binary.
    pub fn new() -> Self {
        Self {
            binary: "pass".to_owned(),
        }
    }

    /// Creates a system executor with a custom binary path.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for SystemPassExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PassExecutor for SystemPassExecutor {
    async fn exec(
        &self,
        store_dir: &Path,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<PassOutput> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .env(STORE_DIR_ENV, store_dir)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| Error::Backend(format!("failed to run {}: {}", self.binary, e)))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input).await?;
            // Closing the pipe signals end of input to `pass insert -m`.
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        Ok(PassOutput {
            status_code: output.status.code().unwrap_or(1),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Backend over a pass store directory.
pub struct PassBackend {
    root: PathBuf,
    executor: Arc<dyn PassExecutor>,
}

impl PassBackend {
    /// Creates a backend for the store at `root` using the system `pass`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_executor(root, Arc::new(SystemPassExecutor::new()))
    }

    /// Creates a backend with a custom executor, useful for tests.
    pub fn with_executor(root: impl AsRef<Path>, executor: Arc<dyn PassExecutor>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            executor,
        }
    }

    /// Store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the encrypted file backing an entry.
    fn entry_file(&self, path: &EntryPath) -> PathBuf {
        self.root
            .join(format!("{}{}", path.as_normalized(), ENTRY_SUFFIX))
    }

    /// Default store location: `$PASSWORD_STORE_DIR`, else `~/.password-store`.
    pub fn default_root() -> Option<PathBuf> {
        std::env::var_os(STORE_DIR_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".password-store")))
    }

    async fn run(&self, action: &str, args: &[&str], stdin: Option<&[u8]>) -> Result<Vec<u8>> {
        debug!(action, "Running pass");
        self.executor
            .exec(&self.root, args, stdin)
            .await?
            .into_result(action)
    }
}

/// Map a file name below the store root to an entry name, if it is one.
fn entry_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(ENTRY_SUFFIX)
        .filter(|stem| !stem.is_empty())
}

#[async_trait]
impl StoreBackend for PassBackend {
    fn name(&self) -> &str {
        "pass"
    }

    async fn list(&self) -> Result<Vec<EntryPath>> {
        if !fs::try_exists(&self.root).await? {
            return Err(Error::Backend(format!(
                "password store not found at {}",
                self.root.display()
            )));
        }

        let mut results = Vec::new();
        let mut pending = vec![(self.root.clone(), EntryPath::root())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_name = entry.file_name();
                let Some(name) = file_name.to_str() else {
                    warn!(dir = %dir.display(), "Skipping non UTF-8 file name");
                    continue;
                };
                // .git, .gpg-id, .extensions and editor droppings
                if name.starts_with('.') {
                    continue;
                }

                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), prefix.join(name)?));
                } else if let Some(stem) = entry_name(name) {
                    results.push(prefix.join(stem)?);
                }
            }
        }

        results.sort();
        Ok(results)
    }

    async fn read(&self, path: &EntryPath) -> Result<SecretValue> {
        let name = path.as_normalized();
        let stdout = self.run("show", &["show", &name], None).await?;
        Ok(SecretValue::new(stdout))
    }

    async fn write(&self, path: &EntryPath, content: &SecretValue) -> Result<()> {
        let name = path.as_normalized();
        self.run(
            "insert",
            &["insert", "--multiline", "--force", &name],
            Some(content.as_bytes()),
        )
        .await?;
        Ok(())
    }

    async fn remove(&self, path: &EntryPath) -> Result<()> {
        let name = path.as_normalized();
        self.run("rm", &["rm", "--recursive", "--force", &name], None)
            .await?;
        Ok(())
    }

    async fn copy(&self, from: &EntryPath, to: &EntryPath, overwrite: bool) -> Result<()> {
        let from_name = from.as_normalized();
        let to_name = to.as_normalized();
        if overwrite {
            self.run("cp", &["cp", "--force", &from_name, &to_name], None)
                .await?;
            return Ok(());
        }

        // pass cp overwrites without asking when stdin is not a terminal.
        if fs::try_exists(self.entry_file(to)).await? {
            return Err(Error::Backend(format!("{} already exists", to)));
        }
        self.run("cp", &["cp", &from_name, &to_name], None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Executor that records invocations and replays a canned output.
    struct ScriptedExecutor {
        calls: Mutex<Vec<(Vec<String>, Option<Vec<u8>>)>>,
        output: PassOutput,
    }

    impl ScriptedExecutor {
        fn new(status_code: i32, stdout: &str, stderr: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                output: PassOutput {
                    status_code,
                    stdout: stdout.as_bytes().to_vec(),
                    stderr: stderr.to_string(),
                },
            })
        }

        fn calls(&self) -> Vec<(Vec<String>, Option<Vec<u8>>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PassExecutor for ScriptedExecutor {
        async fn exec(
            &self,
            _store_dir: &Path,
            args: &[&str],
            stdin: Option<&[u8]>,
        ) -> Result<PassOutput> {
            self.calls.lock().unwrap().push((
                args.iter().map(|a| a.to_string()).collect(),
                stdin.map(|s| s.to_vec()),
            ));
            Ok(self.output.clone())
        }
    }

    fn path(s: &str) -> EntryPath {
        EntryPath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_list_strips_suffix_and_hides_dot_entries() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("mail/gmail")).unwrap();
        std::fs::create_dir_all(root.join(".git/objects")).unwrap();
        std::fs::write(root.join(".gpg-id"), "ABCDEF\n").unwrap();
        std::fs::write(root.join("mail/gmail/personal.gpg"), b"x").unwrap();
        std::fs::write(root.join("mail/work.gpg"), b"x").unwrap();
        std::fs::write(root.join("mail/notes.txt"), b"x").unwrap();
        std::fs::write(root.join(".git/objects/blob.gpg"), b"x").unwrap();

        let backend = PassBackend::with_executor(root, ScriptedExecutor::new(0, "", ""));
        let listing = backend.list().await.unwrap();

        assert_eq!(listing, vec![path("mail/gmail/personal"), path("mail/work")]);
    }

    #[tokio::test]
    async fn test_list_missing_store_fails() {
        let temp = TempDir::new().unwrap();
        let backend = PassBackend::with_executor(
            temp.path().join("absent"),
            ScriptedExecutor::new(0, "", ""),
        );

        let err = backend.list().await.unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }

    #[tokio::test]
    async fn test_read_runs_show() {
        let executor = ScriptedExecutor::new(0, "hunter2\nlogin: me\n", "");
        let backend = PassBackend::with_executor("/store", executor.clone());

        let secret = backend.read(&path("web/github")).await.unwrap();

        assert_eq!(secret.as_str().unwrap(), "hunter2\nlogin: me\n");
        assert_eq!(executor.calls()[0].0, vec!["show", "web/github"]);
    }

    #[tokio::test]
    async fn test_write_pipes_content() {
        let executor = ScriptedExecutor::new(0, "", "");
        let backend = PassBackend::with_executor("/store", executor.clone());

        backend
            .write(&path("web/github"), &SecretValue::from("pw\nnotes"))
            .await
            .unwrap();

        let (args, stdin) = executor.calls().remove(0);
        assert_eq!(args, vec!["insert", "--multiline", "--force", "web/github"]);
        assert_eq!(stdin.unwrap(), b"pw\nnotes");
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let executor = ScriptedExecutor::new(1, "", "gpg: decryption failed: No secret key\n");
        let backend = PassBackend::with_executor("/store", executor);

        let err = backend.read(&path("web/github")).await.unwrap_err();

        match err {
            Error::Backend(detail) => assert_eq!(detail, "gpg: decryption failed: No secret key"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remove_and_copy_args() {
        let executor = ScriptedExecutor::new(0, "", "");
        let backend = PassBackend::with_executor("/store", executor.clone());

        backend.remove(&path("mail")).await.unwrap();
        backend.copy(&path("a/b"), &path("c"), false).await.unwrap();
        backend.copy(&path("a/b"), &path("d"), true).await.unwrap();

        let calls = executor.calls();
        assert_eq!(calls[0].0, vec!["rm", "--recursive", "--force", "mail"]);
        assert_eq!(calls[1].0, vec!["cp", "a/b", "c"]);
        assert!(calls[1].1.is_none());
        assert_eq!(calls[2].0, vec!["cp", "--force", "a/b", "d"]);
    }

    #[tokio::test]
    async fn test_copy_refuses_existing_destination() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("web")).unwrap();
        std::fs::write(temp.path().join("web/github.gpg"), b"x").unwrap();
        let executor = ScriptedExecutor::new(0, "", "");
        let backend = PassBackend::with_executor(temp.path(), executor.clone());

        let err = backend
            .copy(&path("bank"), &path("web/github"), false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Backend(_)));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn test_entry_name() {
        assert_eq!(entry_name("work.gpg"), Some("work"));
        assert_eq!(entry_name(".gpg"), None);
        assert_eq!(entry_name("notes.txt"), None);
    }
}
