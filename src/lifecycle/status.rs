// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Read-only manager snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::config::LifecycleConfig;
use crate::models::DescriptorInfo;

/// One resident instance as seen by a status reader.
#[derive(Debug, Clone, Serialize)]
pub struct ResidentSnapshot {
    pub model_id: String,
    pub memory_gb: f64,
    pub loaded_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub idle_secs: f64,
    pub use_count: u64,
}

/// Full manager snapshot returned by `get_status`.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub resident: Vec<ResidentSnapshot>,
    pub in_flight: Vec<String>,
    pub descriptors: Vec<DescriptorInfo>,
    pub enabled: Vec<String>,
    pub available_memory_gb: f64,
    pub resident_memory_gb: f64,
    pub reaper_cycles: u64,
    pub shutting_down: bool,
    pub config: LifecycleConfig,
}

impl ManagerStatus {
    pub fn is_resident(&self, model_id: &str) -> bool {
        self.resident.iter().any(|r| r.model_id == model_id)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
