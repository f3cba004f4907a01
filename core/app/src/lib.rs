//! passdeck application layer.
//!
//! Ties a store session, its mutation queue, the password generator and
//! the clipboard together behind `PassDeck`, configured by `Settings`.

pub mod deck;
pub mod settings;

pub use deck::PassDeck;
pub use settings::{Settings, DEFAULT_CLIPBOARD_TTL_SECS, SETTINGS_FILENAME};
