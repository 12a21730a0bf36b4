// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model descriptor registry.
//!
//! Catalog of every model the process knows about, keyed by id and
//! iterated in registration order so capability lookups are deterministic.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use super::descriptor::{Capability, DescriptorInfo, ModelConfig, ModelDescriptor};
use super::instance::{AudioModel, ModelError};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Model disabled: {0}")]
    Disabled(String),

    #[error("Invalid descriptor: {0}")]
    Invalid(String),

    #[error("Failed to instantiate {model_id}: {source}")]
    Instantiate {
        model_id: String,
        #[source]
        source: ModelError,
    },
}

#[derive(Default)]
struct RegistryInner {
    order: Vec<String>,
    entries: HashMap<String, Arc<ModelDescriptor>>,
}

impl RegistryInner {
    fn ordered(&self) -> impl Iterator<Item = &Arc<ModelDescriptor>> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }
}

/// Thread-safe registry of model descriptors.
pub struct ModelRegistry {
    inner: RwLock<RegistryInner>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Insert or replace a descriptor. Replacement keeps the original
    /// position in registration order.
    pub fn register(&self, descriptor: ModelDescriptor) -> Result<(), RegistryError> {
        descriptor.validate().map_err(RegistryError::Invalid)?;

        let id = descriptor.id.clone();
        let mut inner = self.inner.write();
        let previous = inner.entries.insert(id.clone(), Arc::new(descriptor));
        match previous {
            Some(prev) => {
                tracing::warn!(
                    model_id = %id,
                    previous = %prev.display_name,
                    "replacing registered model descriptor"
                );
            }
            None => {
                inner.order.push(id.clone());
                tracing::debug!(model_id = %id, "registered model descriptor");
            }
        }
        Ok(())
    }

    /// Look up a descriptor by id.
    pub fn get(&self, id: &str) -> Option<Arc<ModelDescriptor>> {
        self.inner.read().entries.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().entries.contains_key(id)
    }

    /// Ids of all enabled descriptors, in registration order.
    pub fn list_enabled(&self) -> Vec<String> {
        self.inner
            .read()
            .ordered()
            .filter(|d| d.enabled)
            .map(|d| d.id.clone())
            .collect()
    }

    /// Ids supporting `capability`, in registration order.
    pub fn list_by_capability(&self, capability: Capability, enabled_only: bool) -> Vec<String> {
        self.inner
            .read()
            .ordered()
            .filter(|d| d.has_capability(capability))
            .filter(|d| !enabled_only || d.enabled)
            .map(|d| d.id.clone())
            .collect()
    }

    /// Ids flagged safe for commercial use, in registration order.
    pub fn list_commercial_safe(&self, enabled_only: bool) -> Vec<String> {
        self.inner
            .read()
            .ordered()
            .filter(|d| d.commercial_ok)
            .filter(|d| !enabled_only || d.enabled)
            .map(|d| d.id.clone())
            .collect()
    }

    /// Metadata for every registered descriptor, in registration order.
    pub fn describe_all(&self) -> Vec<DescriptorInfo> {
        self.inner.read().ordered().map(|d| d.info()).collect()
    }

    /// Create a fresh, unloaded instance of `id`.
    ///
    /// The factory runs outside the registry lock.
    pub fn create_instance(
        &self,
        id: &str,
        overrides: Option<&ModelConfig>,
    ) -> Result<Box<dyn AudioModel>, RegistryError> {
        let descriptor = self
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if !descriptor.enabled {
            return Err(RegistryError::Disabled(id.to_string()));
        }

        descriptor
            .instantiate(overrides)
            .map_err(|source| RegistryError::Instantiate {
                model_id: id.to_string(),
                source,
            })
    }

    /// Toggle a descriptor. Returns false if the id is unknown.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut inner = self.inner.write();
        let Some(current) = inner.entries.get(id) else {
            return false;
        };
        if current.enabled != enabled {
            let updated = (**current).clone().with_enabled(enabled);
            inner.entries.insert(id.to_string(), Arc::new(updated));
            tracing::info!(model_id = %id, enabled, "model enabled flag changed");
        }
        true
    }

    /// Number of registered descriptors.
    pub fn count(&self) -> usize {
        self.inner.read().entries.len()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
