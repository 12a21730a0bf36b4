// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Models CLI subcommand: list.
//!
//! Builds the registry the same way `serve` does (builtins plus the
//! optional catalog) and prints it.

use crate::config;
use crate::models::{Capability, DescriptorInfo};
use crate::{Runtime, RuntimeConfig};

/// Run `models list`. Returns 0 on success, 2 on a configuration error.
pub async fn run_list(json: bool) -> i32 {
    let env = config::load();
    let runtime = match Runtime::start(RuntimeConfig::from(&env)) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    let status = runtime.manager.get_status().await;
    runtime.shutdown().await;

    if json {
        match serde_json::to_string_pretty(&status.descriptors) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Failed to serialize models: {}", e);
                return 1;
            }
        }
    } else {
        print!("{}", format_models(&status.descriptors, &status.enabled));
    }
    0
}

/// Render descriptors as a fixed-width table.
pub fn format_models(models: &[DescriptorInfo], enabled: &[String]) -> String {
    if models.is_empty() {
        return "No models registered.\n".to_string();
    }

    let mut out = format!(
        "{:<24} {:<24} {:>10} {:<22} {:<8} {:<10}\n",
        "ID", "NAME", "MEMORY GB", "CAPABILITIES", "ENABLED", "COMMERCIAL"
    );
    out.push_str(&"-".repeat(103));
    out.push('\n');

    for m in models {
        let caps = m
            .capabilities
            .iter()
            .map(Capability::as_str)
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&format!(
            "{:<24} {:<24} {:>10.1} {:<22} {:<8} {:<10}\n",
            truncate(&m.id, 23),
            truncate(&m.display_name, 23),
            m.memory_gb,
            truncate(&caps, 21),
            yes_no(m.enabled),
            yes_no(m.commercial_ok),
        ));
    }

    out.push_str(&"-".repeat(103));
    out.push('\n');
    out.push_str(&format!(
        "{} model(s) registered  |  {} enabled\n",
        models.len(),
        enabled.len()
    ));
    out
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
