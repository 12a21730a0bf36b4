// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration loading from environment variables.
//!
//! All configuration values are loaded from `SONANCE_*` environment
//! variables with sensible defaults. Invalid values fall back to defaults
//! without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `SONANCE_MIN_FREE_GB` | 1.0 | Headroom kept free above a model's footprint (GB) |
//! | `SONANCE_IDLE_TIMEOUT` | 600 | Unload models unused this long (secs) |
//! | `SONANCE_MAX_LOADED` | 3 | Soft cap on resident models |
//! | `SONANCE_CLEANUP_INTERVAL` | 60 | Idle reaper period (secs) |
//! | `SONANCE_PROBE` | simulated | Memory source: `simulated` or `device` (nvidia-smi, CUDA) |
//! | `SONANCE_PROBE_TTL_MS` | 1000 | Device reading cache lifetime (ms) |
//! | `SONANCE_POLL_INTERVAL_MS` | 500 | Sleep between memory polls (ms) |
//! | `SONANCE_LOAD_TIMEOUT` | 300 | Default load timeout (secs) |
//! | `SONANCE_SHUTDOWN_TIMEOUT` | 30 | Graceful shutdown timeout (secs) |
//! | `SONANCE_CATALOG` | unset | Path to a TOML model catalog |
//! | `SONANCE_LOG_FORMAT` | json | `json` or `pretty` |
//! | `SONANCE_LOG_LEVEL` | info | `EnvFilter` directive |
//! | `SONANCE_SIMULATED_GPU_GB` | 24.0 | Capacity of the simulated device (GB) |

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::lifecycle::LifecycleConfig;
use crate::telemetry::{LogConfig, LogFormat};
use crate::ProbeSource;

const DEFAULT_SIMULATED_GPU_GB: f64 = 24.0;
const DEFAULT_SHUTDOWN_SECS: u64 = 30;

/// Effective runtime configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub min_free_gb: f64,
    pub idle_timeout_secs: u64,
    pub max_loaded_models: usize,
    pub cleanup_interval_secs: u64,
    pub probe: String,
    pub probe_ttl_ms: u64,
    pub poll_interval_ms: u64,
    pub load_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub catalog: Option<String>,
    pub log_format: String,
    pub log_level: String,
    pub simulated_gpu_gb: f64,
}

/// All runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub lifecycle: LifecycleConfig,
    pub shutdown_timeout: Duration,
    pub catalog_path: Option<PathBuf>,
    pub log: LogConfig,
    pub simulated_gpu_gb: f64,
    pub probe: ProbeSource,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a finite `f64` env var, returning `default` on missing or invalid.
fn parse_f64(key: &str, default: f64) -> f64 {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(default),
        Err(_) => default,
    }
}

/// Load lifecycle manager knobs from environment.
fn load_lifecycle_config() -> LifecycleConfig {
    let defaults = LifecycleConfig::default();
    let min_free_gb = parse_f64("SONANCE_MIN_FREE_GB", defaults.min_free_gb).max(0.0);
    let idle_secs = parse_u64("SONANCE_IDLE_TIMEOUT", defaults.idle_timeout.as_secs());
    let max_loaded = parse_usize("SONANCE_MAX_LOADED", defaults.max_loaded_models);
    let cleanup_secs = parse_u64("SONANCE_CLEANUP_INTERVAL", defaults.cleanup_interval.as_secs());
    let ttl_ms = parse_u64(
        "SONANCE_PROBE_TTL_MS",
        defaults.probe_cache_ttl.as_millis() as u64,
    );
    let poll_ms = parse_u64(
        "SONANCE_POLL_INTERVAL_MS",
        defaults.memory_poll_interval.as_millis() as u64,
    );
    let load_secs = parse_u64("SONANCE_LOAD_TIMEOUT", defaults.default_timeout.as_secs());

    LifecycleConfig {
        min_free_gb,
        idle_timeout: Duration::from_secs(idle_secs.max(1)),
        max_loaded_models: max_loaded.max(1),
        cleanup_interval: Duration::from_secs(cleanup_secs.max(1)),
        probe_cache_ttl: Duration::from_millis(ttl_ms),
        memory_poll_interval: Duration::from_millis(poll_ms.max(10)), // floor: 10ms
        default_timeout: Duration::from_secs(load_secs.max(1)),
    }
}

/// Load logging configuration from environment.
fn load_log_config() -> LogConfig {
    let format = std::env::var("SONANCE_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();
    let level = std::env::var("SONANCE_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    LogConfig {
        format,
        level,
        output_path: None,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let shutdown_secs = parse_u64("SONANCE_SHUTDOWN_TIMEOUT", DEFAULT_SHUTDOWN_SECS).max(1);
    let catalog_path = std::env::var("SONANCE_CATALOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    let simulated_gpu_gb = parse_f64("SONANCE_SIMULATED_GPU_GB", DEFAULT_SIMULATED_GPU_GB);
    let simulated_gpu_gb = if simulated_gpu_gb > 0.0 {
        simulated_gpu_gb
    } else {
        DEFAULT_SIMULATED_GPU_GB
    };
    let probe = std::env::var("SONANCE_PROBE")
        .ok()
        .and_then(|v| v.parse::<ProbeSource>().ok())
        .unwrap_or_default();

    EnvConfig {
        lifecycle: load_lifecycle_config(),
        shutdown_timeout: Duration::from_secs(shutdown_secs),
        catalog_path,
        log: load_log_config(),
        simulated_gpu_gb,
        probe,
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig::default(),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_SECS),
            catalog_path: None,
            log: LogConfig::default(),
            simulated_gpu_gb: DEFAULT_SIMULATED_GPU_GB,
            probe: ProbeSource::default(),
        }
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            min_free_gb: self.lifecycle.min_free_gb,
            idle_timeout_secs: self.lifecycle.idle_timeout.as_secs(),
            max_loaded_models: self.lifecycle.max_loaded_models,
            cleanup_interval_secs: self.lifecycle.cleanup_interval.as_secs(),
            probe: self.probe.as_str().to_string(),
            probe_ttl_ms: self.lifecycle.probe_cache_ttl.as_millis() as u64,
            poll_interval_ms: self.lifecycle.memory_poll_interval.as_millis() as u64,
            load_timeout_secs: self.lifecycle.default_timeout.as_secs(),
            shutdown_timeout_secs: self.shutdown_timeout.as_secs(),
            catalog: self
                .catalog_path
                .as_ref()
                .map(|p| p.display().to_string()),
            log_format: self.log.format.as_str().to_string(),
            log_level: self.log.level.clone(),
            simulated_gpu_gb: self.simulated_gpu_gb,
        }
    }

    /// Combinations that load fine but are probably mistakes.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let lc = &self.lifecycle;
        if lc.cleanup_interval > lc.idle_timeout {
            warnings.push(format!(
                "SONANCE_CLEANUP_INTERVAL ({}s) exceeds SONANCE_IDLE_TIMEOUT ({}s); idle models linger up to one extra interval",
                lc.cleanup_interval.as_secs(),
                lc.idle_timeout.as_secs()
            ));
        }
        if self.probe == ProbeSource::Simulated && lc.min_free_gb >= self.simulated_gpu_gb {
            warnings.push(format!(
                "SONANCE_MIN_FREE_GB ({}) leaves no room on the simulated device ({} GB)",
                lc.min_free_gb, self.simulated_gpu_gb
            ));
        }
        if lc.memory_poll_interval > lc.default_timeout {
            warnings.push(format!(
                "SONANCE_POLL_INTERVAL_MS ({}ms) exceeds SONANCE_LOAD_TIMEOUT ({}s)",
                lc.memory_poll_interval.as_millis(),
                lc.default_timeout.as_secs()
            ));
        }
        warnings
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) const ENV_KEYS: &[&str] = &[
        "SONANCE_MIN_FREE_GB",
        "SONANCE_IDLE_TIMEOUT",
        "SONANCE_MAX_LOADED",
        "SONANCE_CLEANUP_INTERVAL",
        "SONANCE_PROBE",
        "SONANCE_PROBE_TTL_MS",
        "SONANCE_POLL_INTERVAL_MS",
        "SONANCE_LOAD_TIMEOUT",
        "SONANCE_SHUTDOWN_TIMEOUT",
        "SONANCE_CATALOG",
        "SONANCE_LOG_FORMAT",
        "SONANCE_LOG_LEVEL",
        "SONANCE_SIMULATED_GPU_GB",
    ];

    pub(crate) fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.lifecycle, LifecycleConfig::default());
        assert_eq!(cfg.shutdown_timeout.as_secs(), 30);
        assert!(cfg.catalog_path.is_none());
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.log.level, "info");
        assert_eq!(cfg.simulated_gpu_gb, 24.0);
        assert_eq!(cfg.probe, ProbeSource::Simulated);
        assert!(cfg.warnings().is_empty());
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("SONANCE_MIN_FREE_GB", "2.5");
        std::env::set_var("SONANCE_IDLE_TIMEOUT", "120");
        std::env::set_var("SONANCE_MAX_LOADED", "5");
        std::env::set_var("SONANCE_POLL_INTERVAL_MS", "250");
        std::env::set_var("SONANCE_CATALOG", "/etc/sonance/models.toml");
        std::env::set_var("SONANCE_LOG_FORMAT", "pretty");
        std::env::set_var("SONANCE_PROBE", "device");
        let cfg = load();
        assert_eq!(cfg.lifecycle.min_free_gb, 2.5);
        assert_eq!(cfg.lifecycle.idle_timeout, Duration::from_secs(120));
        assert_eq!(cfg.lifecycle.max_loaded_models, 5);
        assert_eq!(cfg.lifecycle.memory_poll_interval, Duration::from_millis(250));
        assert_eq!(
            cfg.catalog_path,
            Some(PathBuf::from("/etc/sonance/models.toml"))
        );
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        assert_eq!(cfg.probe, ProbeSource::Device);
        assert_eq!(cfg.effective_config().probe, "device");
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("SONANCE_MIN_FREE_GB", "lots");
        std::env::set_var("SONANCE_MAX_LOADED", "-1");
        std::env::set_var("SONANCE_LOG_FORMAT", "xml");
        std::env::set_var("SONANCE_SIMULATED_GPU_GB", "NaN");
        std::env::set_var("SONANCE_PROBE", "abacus");
        let cfg = load();
        assert_eq!(cfg.lifecycle.min_free_gb, 1.0);
        assert_eq!(cfg.lifecycle.max_loaded_models, 3);
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.simulated_gpu_gb, 24.0);
        assert_eq!(cfg.probe, ProbeSource::Simulated);
        clear_env_vars();
    }

    #[test]
    fn test_floors_are_applied() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("SONANCE_MIN_FREE_GB", "-3");
        std::env::set_var("SONANCE_MAX_LOADED", "0");
        std::env::set_var("SONANCE_CLEANUP_INTERVAL", "0");
        std::env::set_var("SONANCE_POLL_INTERVAL_MS", "0");
        std::env::set_var("SONANCE_SIMULATED_GPU_GB", "0");
        let cfg = load();
        assert_eq!(cfg.lifecycle.min_free_gb, 0.0);
        assert_eq!(cfg.lifecycle.max_loaded_models, 1);
        assert_eq!(cfg.lifecycle.cleanup_interval, Duration::from_secs(1));
        assert_eq!(cfg.lifecycle.memory_poll_interval, Duration::from_millis(10));
        assert_eq!(cfg.simulated_gpu_gb, 24.0);
        clear_env_vars();
    }

    #[test]
    fn test_warnings_flag_suspicious_combinations() {
        let mut cfg = EnvConfig::default();
        cfg.lifecycle.cleanup_interval = Duration::from_secs(900);
        cfg.lifecycle.min_free_gb = 32.0;
        let warnings = cfg.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("SONANCE_CLEANUP_INTERVAL"));
        assert!(warnings[1].contains("SONANCE_MIN_FREE_GB"));
    }

    #[test]
    fn test_effective_config_mirrors_env_config() {
        let cfg = EnvConfig::default();
        let eff = cfg.effective_config();
        assert_eq!(eff.idle_timeout_secs, 600);
        assert_eq!(eff.probe_ttl_ms, 1000);
        assert_eq!(eff.poll_interval_ms, 500);
        assert_eq!(eff.load_timeout_secs, 300);
        assert_eq!(eff.log_format, "json");
        assert!(eff.catalog.is_none());
    }
}
