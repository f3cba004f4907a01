//! Common utilities and types shared across passdeck crates.
//!
//! This module provides the error taxonomy and the foundational path and
//! secret types used by the storage backends, the store model and the
//! application facade.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{EntryPath, SecretValue};
