// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sonance Core Runtime
//!
//! Lifecycle management for generative audio models sharing one
//! accelerator. Models are loaded on demand, deduplicated while loading,
//! evicted least-recently-used when free memory runs short, reaped after
//! sitting idle, and unloaded in order at shutdown.
//!
//! # Layout
//!
//! - [`models`]: descriptors, the registry, the `AudioModel` contract
//! - [`memory`]: free-memory probes and the simulated device
//! - [`lifecycle`]: the `ModelManager`
//! - [`runner`]: generation jobs on top of the manager
//! - [`config`] / [`telemetry`]: environment configuration and logging

pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod runner;
pub mod telemetry;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use lifecycle::{LifecycleConfig, ModelManager};
use memory::{CachedMemoryProbe, MemoryProbe, SimulatedGpu};
use models::{register_builtins, Catalog, CatalogError, ModelRegistry, RegistryError};
use runner::GenerationRunner;

/// Where the manager reads free memory from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProbeSource {
    /// The simulated device the builtin backends allocate on.
    #[default]
    Simulated,
    /// `nvidia-smi`, then the CUDA driver when built with `cuda`.
    Device,
}

impl ProbeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simulated => "simulated",
            Self::Device => "device",
        }
    }
}

impl FromStr for ProbeSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simulated" | "sim" => Ok(Self::Simulated),
            "device" | "gpu" => Ok(Self::Device),
            other => Err(format!("unknown probe source: {}", other)),
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub lifecycle: LifecycleConfig,
    pub catalog_path: Option<PathBuf>,
    pub simulated_gpu_gb: f64,
    pub probe: ProbeSource,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig::default(),
            catalog_path: None,
            simulated_gpu_gb: 24.0,
            probe: ProbeSource::Simulated,
        }
    }
}

impl From<&config::EnvConfig> for RuntimeConfig {
    fn from(env: &config::EnvConfig) -> Self {
        Self {
            lifecycle: env.lifecycle.clone(),
            catalog_path: env.catalog_path.clone(),
            simulated_gpu_gb: env.simulated_gpu_gb,
            probe: env.probe,
        }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Builtin registration failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// The Sonance runtime instance.
pub struct Runtime {
    pub registry: Arc<ModelRegistry>,
    pub manager: Arc<ModelManager>,
    pub runner: GenerationRunner,
    pub gpu: Arc<SimulatedGpu>,
}

impl Runtime {
    /// Register builtins and the optional catalog, then start the manager.
    /// Must be called inside a tokio runtime.
    pub fn start(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let gpu = Arc::new(SimulatedGpu::new(config.simulated_gpu_gb));
        let registry = Arc::new(ModelRegistry::new());

        let builtins = register_builtins(&registry, &gpu)?;
        let catalog_models = match &config.catalog_path {
            Some(path) => Catalog::from_file(path)?.apply(&registry, &gpu)?,
            None => 0,
        };
        tracing::info!(builtins, catalog_models, "model registry ready");

        let probe: Arc<dyn MemoryProbe> = match config.probe {
            ProbeSource::Simulated => gpu.clone(),
            ProbeSource::Device => Arc::new(CachedMemoryProbe::new(config.lifecycle.probe_cache_ttl)),
        };
        let manager = Arc::new(ModelManager::new(registry.clone(), probe, config.lifecycle));
        let runner = GenerationRunner::new(manager.clone());

        Ok(Self {
            registry,
            manager,
            runner,
            gpu,
        })
    }

    /// Stop the manager and unload everything.
    pub async fn shutdown(&self) -> usize {
        self.manager.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{clear_env_vars, ENV_LOCK};

    #[test]
    fn memory_source_selector_parses() {
        assert_eq!("device".parse::<ProbeSource>(), Ok(ProbeSource::Device));
        assert_eq!(" GPU ".parse::<ProbeSource>(), Ok(ProbeSource::Device));
        assert_eq!("simulated".parse::<ProbeSource>(), Ok(ProbeSource::Simulated));
        assert!("tpu".parse::<ProbeSource>().is_err());
    }

    #[test]
    fn runtime_config_follows_env_memory_source() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        assert_eq!(RuntimeConfig::from(&config::load()).probe, ProbeSource::Simulated);

        std::env::set_var("SONANCE_PROBE", "device");
        std::env::set_var("SONANCE_PROBE_TTL_MS", "250");
        let runtime = RuntimeConfig::from(&config::load());
        assert_eq!(runtime.probe, ProbeSource::Device);
        assert_eq!(
            runtime.lifecycle.probe_cache_ttl,
            std::time::Duration::from_millis(250)
        );
        clear_env_vars();
    }
}
