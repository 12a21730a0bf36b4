// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Telemetry for the Sonance runtime.
//!
//! Structured logging via `tracing`, lifecycle spans, and counters and
//! gauges via the `metrics` facade. Nothing here installs a metrics
//! exporter; embedders choose their own recorder.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    record_available_memory, record_cache_hit, record_eviction, record_generation,
    record_load, record_load_failure, record_resident_count,
};
pub use spans::{GenerationSpan, ModelSpan, SpanExt};
