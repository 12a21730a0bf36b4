// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Span utilities and extension traits.

use tracing::{info_span, Span};

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Spans around model lifecycle transitions.
pub struct ModelSpan;

impl ModelSpan {
    /// Span for a fresh load. `status` and `error.message` are filled in
    /// by [`SpanExt::record_result`].
    pub fn load(model_id: &str) -> Span {
        info_span!(
            "model_load",
            model_id = %model_id,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }

    /// Span for tearing down a resident instance.
    pub fn evict(model_id: &str, reason: &'static str) -> Span {
        info_span!(
            "model_evict",
            model_id = %model_id,
            reason,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}

/// Span for one generation job.
pub struct GenerationSpan;

impl GenerationSpan {
    pub fn new(job_id: &str, target: &str) -> Span {
        info_span!(
            "generation",
            job_id = %job_id,
            target = %target,
            model_id = tracing::field::Empty,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evict_span_records_result() {
        let span = ModelSpan::evict("musicgen-small", "idle");
        span.record_result(&Err::<(), _>("unload panicked"));
        span.record_result(&Ok::<(), String>(()));
    }
}
