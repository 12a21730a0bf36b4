// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Static model metadata: capability tags, descriptors and factories.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::instance::{AudioModel, ModelError};

/// Free-form model configuration (factory input).
pub type ModelConfig = serde_json::Map<String, serde_json::Value>;

/// Builds a fresh, unloaded instance from a merged configuration.
pub type ModelFactory =
    Arc<dyn Fn(&ModelConfig) -> Result<Box<dyn AudioModel>, ModelError> + Send + Sync>;

/// What kind of audio a model can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Music,
    Sfx,
    Ambient,
    Tts,
}

impl Capability {
    pub const ALL: [Capability; 4] = [Self::Music, Self::Sfx, Self::Ambient, Self::Tts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Music => "music",
            Self::Sfx => "sfx",
            Self::Ambient => "ambient",
            Self::Tts => "tts",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "music" => Ok(Self::Music),
            "sfx" | "sound_effect" | "sound-effect" => Ok(Self::Sfx),
            "ambient" => Ok(Self::Ambient),
            "tts" | "speech" => Ok(Self::Tts),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}

/// Registry entry describing one model. Immutable once registered; the
/// registry swaps in a copy when the enabled flag is toggled.
#[derive(Clone)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    /// Declared footprint estimate used for budget accounting.
    pub memory_gb: f64,
    pub capabilities: Vec<Capability>,
    pub enabled: bool,
    /// Informational licensing flag, used only as a lookup preference.
    pub commercial_ok: bool,
    pub default_config: ModelConfig,
    factory: ModelFactory,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        memory_gb: f64,
        capabilities: Vec<Capability>,
        factory: ModelFactory,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            memory_gb,
            capabilities,
            enabled: true,
            commercial_ok: false,
            default_config: ModelConfig::new(),
            factory,
        }
    }

    pub fn with_commercial(mut self, commercial_ok: bool) -> Self {
        self.commercial_ok = commercial_ok;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_default_config(mut self, config: ModelConfig) -> Self {
        self.default_config = config;
        self
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    /// Check descriptor fields for correctness.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id cannot be empty".into());
        }
        if self.capabilities.is_empty() {
            return Err(format!("{}: capabilities cannot be empty", self.id));
        }
        if !self.memory_gb.is_finite() || self.memory_gb < 0.0 {
            return Err(format!("{}: memory_gb must be a non-negative number", self.id));
        }
        Ok(())
    }

    /// Merge caller overrides over the default configuration.
    pub fn merged_config(&self, overrides: Option<&ModelConfig>) -> ModelConfig {
        let mut config = self.default_config.clone();
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                config.insert(key.clone(), value.clone());
            }
        }
        config
    }

    pub(crate) fn instantiate(
        &self,
        overrides: Option<&ModelConfig>,
    ) -> Result<Box<dyn AudioModel>, ModelError> {
        (self.factory)(&self.merged_config(overrides))
    }

    pub fn info(&self) -> DescriptorInfo {
        DescriptorInfo {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            memory_gb: self.memory_gb,
            capabilities: self.capabilities.clone(),
            enabled: self.enabled,
            commercial_ok: self.commercial_ok,
        }
    }
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("memory_gb", &self.memory_gb)
            .field("capabilities", &self.capabilities)
            .field("enabled", &self.enabled)
            .field("commercial_ok", &self.commercial_ok)
            .finish_non_exhaustive()
    }
}

/// Serializable descriptor metadata (no factory).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorInfo {
    pub id: String,
    pub display_name: String,
    pub memory_gb: f64,
    pub capabilities: Vec<Capability>,
    pub enabled: bool,
    pub commercial_ok: bool,
}
