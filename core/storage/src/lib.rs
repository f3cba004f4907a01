//! Store backend abstraction for passdeck.
//!
//! This module provides the trait-based interface to the trusted
//! collaborator that owns the encrypted password store, plus the built-in
//! implementations and a registry for resolving one from configuration.
//!
//! # Design Principles
//! - Backend isolation: no gpg or git specifics outside this crate
//! - Async operations: every call may wait on an external process
//! - Unified error semantics: backend failures surface as `Error::Backend`

pub mod backend;
pub mod memory;
pub mod pass;
pub mod registry;

pub use backend::{BackendOp, StoreBackend};
pub use memory::MemoryBackend;
pub use pass::{PassBackend, PassExecutor, PassOutput, SystemPassExecutor};
pub use registry::{create_default_registry, BackendFactory, BackendRegistry};
