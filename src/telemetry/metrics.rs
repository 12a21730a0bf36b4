// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle metrics recorded through the `metrics` facade.
//!
//! Calls are no-ops until the embedding process installs a recorder.

use std::time::Duration;

use ::metrics::{counter, gauge, histogram};

pub fn record_load(model_id: &str, elapsed: Duration) {
    counter!("sonance_model_loads_total", "model" => model_id.to_string()).increment(1);
    histogram!("sonance_model_load_seconds", "model" => model_id.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_load_failure(target: &str, reason: &'static str) {
    counter!(
        "sonance_model_load_failures_total",
        "model" => target.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_cache_hit(model_id: &str) {
    counter!("sonance_model_cache_hits_total", "model" => model_id.to_string()).increment(1);
}

/// `reason` is one of `lru`, `capacity`, `idle`, `explicit`, `shutdown`.
pub fn record_eviction(model_id: &str, reason: &'static str) {
    counter!(
        "sonance_model_evictions_total",
        "model" => model_id.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_resident_count(count: usize) {
    gauge!("sonance_models_resident").set(count as f64);
}

pub fn record_available_memory(gb: f64) {
    gauge!("sonance_available_memory_gb").set(gb);
}

pub fn record_generation(model_id: &str, elapsed: Duration, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(
        "sonance_generations_total",
        "model" => model_id.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    if ok {
        histogram!("sonance_generation_seconds", "model" => model_id.to_string())
            .record(elapsed.as_secs_f64());
    }
}
