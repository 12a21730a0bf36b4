// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model catalog file parsing and validation.
//!
//! A catalog adds descriptors to the startup table and toggles existing
//! ones:
//!
//! ```toml
//! [[model]]
//! id = "musicgen-stereo"
//! display_name = "MusicGen Stereo"
//! memory_gb = 6.5
//! capabilities = ["music"]
//! commercial_ok = false
//! backend = "simulated"
//!
//! [model.config]
//! load_delay_ms = 800
//!
//! [overrides.audiogen-medium]
//! enabled = false
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::descriptor::{Capability, ModelConfig, ModelDescriptor};
use super::registry::{ModelRegistry, RegistryError};
use super::simulated::SimulatedModel;
use crate::memory::SimulatedGpu;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid catalog entry: {0}")]
    Invalid(String),

    #[error("Override for unknown model: {0}")]
    UnknownOverride(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Implementation used to instantiate a catalog entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Simulated,
}

fn default_true() -> bool {
    true
}

/// One `[[model]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub display_name: String,
    pub memory_gb: f64,
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub commercial_ok: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub config: ModelConfig,
}

/// Per-id flag overrides applied after registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogOverride {
    pub enabled: Option<bool>,
}

/// Parsed catalog file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default, rename = "model")]
    pub models: Vec<CatalogEntry>,
    #[serde(default)]
    pub overrides: BTreeMap<String, CatalogOverride>,
}

impl Catalog {
    /// Load a catalog from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a catalog from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check every entry for correctness.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.models {
            if entry.id.trim().is_empty() {
                return Err(CatalogError::Invalid("id cannot be empty".into()));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(CatalogError::Invalid(format!("duplicate id: {}", entry.id)));
            }
            if !(entry.memory_gb.is_finite() && entry.memory_gb > 0.0) {
                return Err(CatalogError::Invalid(format!(
                    "{}: memory_gb must be positive",
                    entry.id
                )));
            }
            if entry.capabilities.is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "{}: capabilities cannot be empty",
                    entry.id
                )));
            }
        }
        Ok(())
    }

    /// Build a descriptor for `entry` on the given backend.
    fn descriptor(entry: &CatalogEntry, gpu: &Arc<SimulatedGpu>) -> ModelDescriptor {
        let factory = match entry.backend {
            Backend::Simulated => SimulatedModel::factory(&entry.id, entry.memory_gb, gpu.clone()),
        };
        ModelDescriptor::new(
            &entry.id,
            &entry.display_name,
            entry.memory_gb,
            entry.capabilities.clone(),
            factory,
        )
        .with_commercial(entry.commercial_ok)
        .with_enabled(entry.enabled)
        .with_default_config(entry.config.clone())
    }

    /// Register entries, then apply overrides. Returns entries registered.
    pub fn apply(
        &self,
        registry: &ModelRegistry,
        gpu: &Arc<SimulatedGpu>,
    ) -> Result<usize, CatalogError> {
        for entry in &self.models {
            registry.register(Self::descriptor(entry, gpu))?;
        }
        for (id, over) in &self.overrides {
            if let Some(enabled) = over.enabled {
                if !registry.set_enabled(id, enabled) {
                    return Err(CatalogError::UnknownOverride(id.clone()));
                }
            }
        }
        Ok(self.models.len())
    }
}
