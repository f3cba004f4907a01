//! Transient secret handling for passdeck.
//!
//! Everything in this crate lives only in memory: generated passwords,
//! decrypted entries waiting to be shown or copied, and the clipboard
//! exposure window. Plaintext is zeroized when dropped.

pub mod clipboard;
pub mod generator;
pub mod pending;

pub use clipboard::{Clipboard, ClipboardSession, MemoryClipboard};
#[cfg(feature = "system-clipboard")]
pub use clipboard::SystemClipboard;
pub use generator::{generate, CharsetPolicy, DEFAULT_LENGTH, MAX_LENGTH};
pub use pending::{PendingSecret, SecretOrigin};
