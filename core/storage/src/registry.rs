//! Backend registry for resolving a store backend from configuration.

use std::collections::HashMap;
use std::sync::Arc;
use serde_json::Value;

use passdeck_common::{Error, Result};
use crate::backend::StoreBackend;
use crate::pass::{PassBackend, SystemPassExecutor};

/// Factory function type for creating backends.
pub type BackendFactory = Box<dyn Fn(Value) -> Result<Arc<dyn StoreBackend>> + Send + Sync>;

/// Registry for store backend factories.
///
/// Allows registration and resolution of backends by name and
/// configuration, so the caller's settings file picks the backend.
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory.
    ///
    /// # Errors
    /// - Returns error if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: BackendFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Backend '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a backend by name and configuration.
    ///
    /// # Errors
    /// - Backend not registered
    /// - Configuration invalid for the backend
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn StoreBackend>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Backend '{}' is not registered", name)))?;
        factory(config)
    }

    /// Get list of registered backend names, sorted.
    pub fn backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn memory_factory(_config: Value) -> Result<Arc<dyn StoreBackend>> {
    Ok(Arc::new(crate::memory::MemoryBackend::new()))
}

fn pass_factory(config: Value) -> Result<Arc<dyn StoreBackend>> {
    let root = config
        .get("root")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidInput("pass backend requires a 'root' path".to_string()))?;

    let executor = match config.get("binary").and_then(|v| v.as_str()) {
        Some(binary) => SystemPassExecutor::with_binary(binary),
        None => SystemPassExecutor::new(),
    };

    Ok(Arc::new(PassBackend::with_executor(root, Arc::new(executor))))
}

/// Create a registry with the built-in backends (`memory`, `pass`).
pub fn create_default_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry
        .factories
        .insert("memory".to_string(), Box::new(memory_factory));
    registry
        .factories
        .insert("pass".to_string(), Box::new(pass_factory));
    registry
}
