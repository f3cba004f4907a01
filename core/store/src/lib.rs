//! Password store model and mutation engine.
//!
//! This crate turns a backend listing into an addressable tree, applies
//! user mutations to the store through the backend, and keeps the tree
//! consistent by rebuilding it after every change.
//!
//! # Architecture
//! - `StoreSession` owns the backend, the tree and the mutation gate
//! - `MutationEngine` validates and applies one mutation at a time
//! - `MutationQueue` serialises mutations from interactive callers
//! - `FilterIndex` narrows the tree to entries matching a query

pub mod config;
pub mod confirm;
pub mod content;
pub mod engine;
pub mod filter;
pub mod queue;
pub mod session;
pub mod tree;

pub use config::{CaseSensitivity, ChildOrdering, TreeOptions};
pub use confirm::{Confirmation, ConfirmedAction};
pub use content::EntryContent;
pub use engine::MutationEngine;
pub use filter::{FilterIndex, FilterView};
pub use queue::{Mutation, MutationQueue, MutationWorker, PendingMutation, DEFAULT_CAPACITY};
pub use session::{SessionHandle, StoreSession};
pub use tree::{ChildEntry, NodeType, StoreNode, StoreTree};
