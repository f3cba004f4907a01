//! User settings persisted as JSON.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use passdeck_common::{Error, Result};
use passdeck_secret::{CharsetPolicy, DEFAULT_LENGTH, MAX_LENGTH};
use passdeck_storage::PassBackend;
use passdeck_store::{CaseSensitivity, ChildOrdering, TreeOptions};

/// Settings file name inside the config directory.
pub const SETTINGS_FILENAME: &str = "settings.json";

/// Application directory under the platform config dir.
pub const APP_DIRNAME: &str = "passdeck";

/// Default clipboard exposure, matching `pass`'s `PASSWORD_STORE_CLIP_TIME`.
pub const DEFAULT_CLIPBOARD_TTL_SECS: u64 = 45;

/// Caller configuration. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the password store.
    pub store_dir: PathBuf,
    /// Backend name in the registry ("pass" or "memory").
    pub backend: String,
    /// `pass` executable; `None` finds it on `PATH`.
    pub pass_binary: Option<String>,
    /// Order of children in the tree.
    pub ordering: ChildOrdering,
    /// Whether names differing only in case are the same node.
    pub case_sensitivity: CaseSensitivity,
    /// Length of generated passwords.
    pub password_length: usize,
    /// Characters generated passwords are drawn from.
    pub charset: CharsetPolicy,
    /// Seconds a copied secret stays on the clipboard.
    pub clipboard_ttl_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_dir: PassBackend::default_root()
                .unwrap_or_else(|| PathBuf::from(".password-store")),
            backend: "pass".to_string(),
            pass_binary: None,
            ordering: ChildOrdering::default(),
            case_sensitivity: CaseSensitivity::default(),
            password_length: DEFAULT_LENGTH,
            charset: CharsetPolicy::default(),
            clipboard_ttl_secs: DEFAULT_CLIPBOARD_TTL_SECS,
        }
    }
}

impl Settings {
    /// Default settings file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIRNAME).join(SETTINGS_FILENAME))
    }

    /// Load settings from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    /// - `Io` if the file exists but cannot be read
    /// - `Serialization` if the file is not valid settings JSON
    /// - `InvalidInput` if a value is out of range
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let bytes = std::fs::read(path)?;
        let settings = Self::from_bytes(&bytes)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Write settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_bytes()?)?;
        debug!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Serialize to pretty JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.password_length == 0 || self.password_length > MAX_LENGTH {
            return Err(Error::InvalidInput(format!(
                "password_length must be between 1 and {}",
                MAX_LENGTH
            )));
        }
        if self.backend.is_empty() {
            return Err(Error::InvalidInput("backend must not be empty".to_string()));
        }
        Ok(())
    }

    /// Tree rules for a session.
    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions::new(self.ordering, self.case_sensitivity)
    }

    /// Clipboard exposure window.
    pub fn clipboard_ttl(&self) -> Duration {
        Duration::from_secs(self.clipboard_ttl_secs)
    }

    /// Registry configuration for the selected backend.
    pub fn backend_config(&self) -> serde_json::Value {
        let mut config = serde_json::json!({
            "root": self.store_dir.to_string_lossy(),
        });
        if let Some(binary) = &self.pass_binary {
            config["binary"] = serde_json::Value::String(binary.clone());
        }
        config
    }
}
