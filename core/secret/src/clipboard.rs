//! Time-bounded clipboard exposure.
//!
//! A copied secret stays on the clipboard until its TTL elapses, the caller
//! clears it, or the session is dropped. Only one expiry timer is alive at a
//! time; a successful copy cancels the previous timer before arming its own.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::pending::{PendingSecret, SecretOrigin};
use passdeck_common::{Error, Result};

/// Write access to a clipboard.
pub trait Clipboard: Send + Sync {
    /// Replace the clipboard content with `text`.
    fn set_text(&self, text: &str) -> Result<()>;

    /// Overwrite the clipboard with an empty value.
    fn clear(&self) -> Result<()>;
}

/// Process-local clipboard for tests and headless use.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    content: Mutex<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content; empty once cleared.
    pub fn contents(&self) -> String {
        self.content
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        let mut content = self
            .content
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        zeroize::Zeroize::zeroize(&mut *content);
        content.push_str(text);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut content = self
            .content
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        zeroize::Zeroize::zeroize(&mut *content);
        Ok(())
    }
}

/// The desktop clipboard.
///
/// The connection is opened on first use and held for the lifetime of the
/// value. On X11 and Wayland the process owns the selection only while it
/// is open.
#[cfg(feature = "system-clipboard")]
#[derive(Default)]
pub struct SystemClipboard {
    clipboard: Mutex<Option<arboard::Clipboard>>,
}

#[cfg(feature = "system-clipboard")]
impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self, text: String) -> Result<()> {
        let mut slot = lock(&self.clipboard);
        let opened = match slot.take() {
            Some(clipboard) => clipboard,
            None => arboard::Clipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?,
        };
        slot.insert(opened)
            .set_text(text)
            .map_err(|e| Error::Clipboard(e.to_string()))
    }
}

#[cfg(feature = "system-clipboard")]
impl std::fmt::Debug for SystemClipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemClipboard")
            .field("open", &lock(&self.clipboard).is_some())
            .finish()
    }
}

#[cfg(feature = "system-clipboard")]
impl Clipboard for SystemClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        self.write(text.to_string())
    }

    fn clear(&self) -> Result<()> {
        self.write(String::new())
    }
}

/// The secret currently on the clipboard.
#[derive(Debug, Clone)]
struct Exposure {
    generation: u64,
    origin: SecretOrigin,
    expires_at: DateTime<Utc>,
}

/// Owns the clipboard exposure window.
///
/// A failed copy leaves the previous secret and its timer in place.
///
/// Timers run as tokio tasks, so `copy` must be called inside a runtime.
pub struct ClipboardSession {
    clipboard: Arc<dyn Clipboard>,
    timer: Mutex<Option<JoinHandle<()>>>,
    generation: AtomicU64,
    exposure: Arc<Mutex<Option<Exposure>>>,
}

impl ClipboardSession {
    pub fn new(clipboard: Arc<dyn Clipboard>) -> Self {
        Self {
            clipboard,
            timer: Mutex::new(None),
            generation: AtomicU64::new(0),
            exposure: Arc::new(Mutex::new(None)),
        }
    }

    /// Put `secret` on the clipboard and schedule a clear after `ttl`.
    ///
    /// Returns the expiry deadline.
    ///
    /// # Errors
    /// - `InvalidInput` if the secret is not UTF-8 text
    /// - `Clipboard` if the clipboard cannot be written
    pub fn copy(&self, secret: &PendingSecret, ttl: Duration) -> Result<DateTime<Utc>> {
        let text = secret.value().as_str()?;
        let ttl_chrono = chrono::Duration::from_std(ttl)
            .map_err(|_| Error::InvalidInput(format!("clipboard ttl too large: {:?}", ttl)))?;

        let (generation, expires_at) = {
            let mut exposure = lock(&self.exposure);
            self.clipboard.set_text(text)?;
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let expires_at = Utc::now() + ttl_chrono;
            *exposure = Some(Exposure {
                generation,
                origin: secret.origin().clone(),
                expires_at,
            });
            (generation, expires_at)
        };

        self.cancel_timer();

        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        debug!(origin = %secret.origin(), ttl_ms, "Secret copied to clipboard");

        let clipboard = Arc::clone(&self.clipboard);
        let exposure = Arc::clone(&self.exposure);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut exposure = lock(&exposure);
            let current = exposure.as_ref().map(|e| e.generation);
            if current == Some(generation) {
                if let Err(e) = clipboard.clear() {
                    warn!(error = %e, "Failed to clear clipboard on expiry");
                }
                *exposure = None;
                debug!("Clipboard cleared on expiry");
            }
        });
        *lock(&self.timer) = Some(handle);

        Ok(expires_at)
    }

    /// Cancel the timer and wipe the clipboard now.
    ///
    /// # Errors
    /// - `Clipboard` if the clipboard cannot be written
    pub fn clear_now(&self) -> Result<()> {
        self.cancel_timer();
        let mut exposure = lock(&self.exposure);
        self.generation.fetch_add(1, Ordering::SeqCst);
        *exposure = None;
        self.clipboard.clear()?;
        debug!("Clipboard cleared");
        Ok(())
    }

    /// True while a copied secret has not expired or been cleared.
    pub fn is_active(&self) -> bool {
        lock(&self.exposure).is_some()
    }

    /// Deadline of the active secret.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.exposure).as_ref().map(|e| e.expires_at)
    }

    /// Origin of the active secret.
    pub fn origin(&self) -> Option<SecretOrigin> {
        lock(&self.exposure).as_ref().map(|e| e.origin.clone())
    }

    fn cancel_timer(&self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
    }
}

impl Drop for ClipboardSession {
    fn drop(&mut self) {
        self.cancel_timer();
        if lock(&self.exposure).take().is_some() {
            if let Err(e) = self.clipboard.clear() {
                warn!(error = %e, "Failed to clear clipboard on drop");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
