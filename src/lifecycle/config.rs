// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle manager configuration.

use std::time::Duration;

use serde::Serialize;

use crate::models::ModelConfig;

/// Constructor-time knobs for [`super::ModelManager`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleConfig {
    /// Free memory to keep unallocated on top of a model's footprint (GB).
    pub min_free_gb: f64,
    /// Resident instances unused for longer than this are reaped.
    pub idle_timeout: Duration,
    /// Soft cap on resident instances; reaching it evicts the LRU
    /// instance before a fresh load.
    pub max_loaded_models: usize,
    /// Period of the idle reaper.
    pub cleanup_interval: Duration,
    /// How long a memory reading stays fresh.
    pub probe_cache_ttl: Duration,
    /// Sleep between memory polls while waiting for budget.
    pub memory_poll_interval: Duration,
    /// Timeout used when the caller does not supply one.
    pub default_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            min_free_gb: 1.0,
            idle_timeout: Duration::from_secs(600),
            max_loaded_models: 3,
            cleanup_interval: Duration::from_secs(60),
            probe_cache_ttl: Duration::from_secs(1),
            memory_poll_interval: Duration::from_millis(500),
            default_timeout: Duration::from_secs(300),
        }
    }
}

/// Per-call options for [`super::ModelManager::get_model`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Poll and evict until memory frees up, bounded by `timeout`.
    /// When false, run one eviction pass and load regardless.
    pub wait_for_memory: bool,
    /// Bound on waiting for memory or for another caller's load.
    pub timeout: Option<Duration>,
    /// Merged over the descriptor's default config on a fresh load.
    pub overrides: Option<ModelConfig>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            wait_for_memory: true,
            timeout: None,
            overrides: None,
        }
    }
}

impl LoadOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn no_wait(mut self) -> Self {
        self.wait_for_memory = false;
        self
    }

    pub fn with_overrides(mut self, overrides: ModelConfig) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

/// Preferences for capability-based lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityPreference {
    /// Return an already-resident candidate without a memory check.
    pub prefer_loaded: bool,
    /// Narrow to commercially-safe candidates when any exist.
    pub prefer_commercial: bool,
}

impl Default for CapabilityPreference {
    fn default() -> Self {
        Self {
            prefer_loaded: true,
            prefer_commercial: false,
        }
    }
}
