// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Generation job runner.
//!
//! Resolves a model through the lifecycle manager and runs one
//! generation against it. The runner never loads or unloads anything
//! itself; a failed generation leaves manager state as it was.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::lifecycle::{CapabilityPreference, LifecycleError, LoadOptions, ModelManager};
use crate::models::{Capability, GenerationError, GenerationOutput, GenerationRequest};
use crate::telemetry::{self, GenerationSpan, SpanExt};

/// Which model a job should run on.
#[derive(Debug, Clone)]
pub enum ModelTarget {
    Id(String),
    Capability {
        capability: Capability,
        prefs: CapabilityPreference,
    },
}

impl ModelTarget {
    pub fn capability(capability: Capability) -> Self {
        Self::Capability {
            capability,
            prefs: CapabilityPreference::default(),
        }
    }
}

impl fmt::Display for ModelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Capability { capability, .. } => write!(f, "capability:{}", capability),
        }
    }
}

/// One unit of work.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: Uuid,
    pub target: ModelTarget,
    pub request: GenerationRequest,
    pub load_options: LoadOptions,
}

impl GenerationJob {
    pub fn new(target: ModelTarget, request: GenerationRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            request,
            load_options: LoadOptions::default(),
        }
    }

    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = options;
        self
    }
}

/// A completed job.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub model_id: String,
    pub output: GenerationOutput,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    /// No model could be made resident. Callers should retry later.
    #[error("Model unavailable for {target}: {source}")]
    Unavailable {
        target: String,
        #[source]
        source: LifecycleError,
    },

    #[error("Generation failed on {model_id}: {source}")]
    Generation {
        model_id: String,
        #[source]
        source: GenerationError,
    },
}

impl RunnerError {
    /// Unavailability is retryable when the underlying cause is; a bad
    /// request never is.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable { source, .. } => source.is_retryable(),
            Self::Generation { .. } => false,
        }
    }
}

/// Runs generation jobs against models supplied by a [`ModelManager`].
pub struct GenerationRunner {
    manager: Arc<ModelManager>,
}

impl GenerationRunner {
    pub fn new(manager: Arc<ModelManager>) -> Self {
        Self { manager }
    }

    pub async fn run(&self, job: GenerationJob) -> Result<JobOutcome, RunnerError> {
        let target = job.target.to_string();
        let span = GenerationSpan::new(&job.id.to_string(), &target);
        let result = self.run_inner(&job).instrument(span.clone()).await;
        span.record_result(&result);
        if let Ok(outcome) = &result {
            span.record("latency_ms", outcome.elapsed.as_millis() as u64);
        }
        result
    }

    async fn run_inner(&self, job: &GenerationJob) -> Result<JobOutcome, RunnerError> {
        let started = Instant::now();
        let resolved = match &job.target {
            ModelTarget::Id(id) => {
                self.manager
                    .acquire(id, job.load_options.clone())
                    .await
            }
            ModelTarget::Capability { capability, prefs } => {
                self.manager
                    .acquire_for_capability_with(*capability, *prefs, job.load_options.clone())
                    .await
            }
        };
        let model = resolved.map_err(|source| {
            tracing::warn!(job_id = %job.id, target = %job.target, error = %source, "no model for job");
            RunnerError::Unavailable {
                target: job.target.to_string(),
                source,
            }
        })?;

        let model_id = model.model_id().to_string();
        tracing::Span::current().record("model_id", model_id.as_str());

        let result = model.generate(&job.request).await;
        let elapsed = started.elapsed();
        telemetry::record_generation(&model_id, elapsed, result.is_ok());

        let output = result.map_err(|source| RunnerError::Generation {
            model_id: model_id.clone(),
            source,
        })?;

        tracing::info!(
            job_id = %job.id,
            model_id = %model_id,
            duration_secs = output.duration_secs,
            elapsed_ms = elapsed.as_millis() as u64,
            "generation complete"
        );
        Ok(JobOutcome {
            job_id: job.id,
            model_id,
            output,
            elapsed,
        })
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
