// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration directly from environment variables
//! and never start the manager.

use crate::config::{self, EffectiveConfig, EnvConfig};
use crate::models::Catalog;

/// Print effective config as key-value pairs to stdout.
pub fn run_show(json: bool) {
    let cfg = config::load().effective_config();
    if json {
        match serde_json::to_string_pretty(&cfg) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Failed to serialize config: {}", e),
        }
    } else {
        print!("{}", format_config(&cfg));
    }
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    print!("{}", format_config(&EnvConfig::default().effective_config()));
}

/// Validate configuration and the catalog file, if one is set.
///
/// Returns 0 if valid, 1 if any warnings are found, 2 if the catalog
/// cannot be loaded.
pub fn run_validate() -> i32 {
    let env = config::load();

    if let Some(path) = &env.catalog_path {
        match Catalog::from_file(path) {
            Ok(catalog) => println!(
                "Catalog {}: {} model(s), {} override(s)",
                path.display(),
                catalog.models.len(),
                catalog.overrides.len()
            ),
            Err(e) => {
                eprintln!("ERROR: {}", e);
                return 2;
            }
        }
    }

    let warnings = env.warnings();
    for w in &warnings {
        eprintln!("WARNING: {}", w);
    }

    if warnings.is_empty() {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

fn format_config(cfg: &EffectiveConfig) -> String {
    let mut out = String::new();
    let mut line = |key: &str, value: String| {
        out.push_str(key);
        out.push('=');
        out.push_str(&value);
        out.push('\n');
    };
    line("SONANCE_MIN_FREE_GB", cfg.min_free_gb.to_string());
    line("SONANCE_IDLE_TIMEOUT", cfg.idle_timeout_secs.to_string());
    line("SONANCE_MAX_LOADED", cfg.max_loaded_models.to_string());
    line("SONANCE_CLEANUP_INTERVAL", cfg.cleanup_interval_secs.to_string());
    line("SONANCE_PROBE", cfg.probe.clone());
    line("SONANCE_PROBE_TTL_MS", cfg.probe_ttl_ms.to_string());
    line("SONANCE_POLL_INTERVAL_MS", cfg.poll_interval_ms.to_string());
    line("SONANCE_LOAD_TIMEOUT", cfg.load_timeout_secs.to_string());
    line("SONANCE_SHUTDOWN_TIMEOUT", cfg.shutdown_timeout_secs.to_string());
    line("SONANCE_CATALOG", cfg.catalog.clone().unwrap_or_default());
    line("SONANCE_LOG_FORMAT", cfg.log_format.clone());
    line("SONANCE_LOG_LEVEL", cfg.log_level.clone());
    line("SONANCE_SIMULATED_GPU_GB", cfg.simulated_gpu_gb.to_string());
    out
}
