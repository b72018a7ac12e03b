//! Process-local mapping from pipeline name to Pipeline Definition.
//! Populated once at startup by importing each pipeline module, each of
//! which calls [`Registry::register`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use super::pipeline::PipelineDefinition;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("pipeline already registered: {0}")]
    AlreadyRegistered(String),
    #[error("pipeline not found: {0}")]
    NotFound(String),
}

/// A process-lifetime map, not a global singleton: held by the worker
/// process's composition root and passed to the Run Executor and Recovery
/// Orchestrator by `Arc` reference.
#[derive(Default)]
pub struct Registry {
    definitions: RwLock<HashMap<String, Arc<PipelineDefinition>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if a pipeline with this name is already present.
    pub fn register(&self, definition: PipelineDefinition) -> Result<(), RegistryError> {
        let mut definitions = self.definitions.write().expect("registry lock poisoned");
        if definitions.contains_key(&definition.name) {
            return Err(RegistryError::AlreadyRegistered(definition.name));
        }
        definitions.insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    /// Fails when absent.
    pub fn get(&self, name: &str) -> Result<Arc<PipelineDefinition>, RegistryError> {
        self.definitions
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// A snapshot of the currently registered definitions.
    pub fn list(&self) -> Vec<Arc<PipelineDefinition>> {
        self.definitions
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Test-only: removes a definition so tests can reset the registry
    /// between cases.
    pub fn remove(&self, name: &str) {
        self.definitions
            .write()
            .expect("registry lock poisoned")
            .remove(name);
    }
}
