// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle error types.
//!
//! Every variant means "model not available right now". Callers of
//! `get_model` only ever see `None`; the variant is logged.

use thiserror::Error;

use crate::models::{Capability, ModelError, RegistryError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Model disabled: {0}")]
    Disabled(String),

    #[error("No enabled model provides capability: {0}")]
    NoCapableModel(Capability),

    #[error("Failed to load {model_id}: {reason}")]
    Load { model_id: String, reason: String },

    #[error("Timed out waiting for {required_gb:.2} GB for {model_id} ({available_gb:.2} GB free)")]
    MemoryTimeout {
        model_id: String,
        required_gb: f64,
        available_gb: f64,
    },

    #[error("Timed out waiting for in-flight load of {0}")]
    WaitTimeout(String),

    #[error("In-flight load of {0} failed or was abandoned")]
    LoadAbandoned(String),

    #[error("Manager is shutting down")]
    ShuttingDown,
}

impl LifecycleError {
    /// Whether a later retry may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound(_) | Self::Disabled(_) | Self::NoCapableModel(_))
    }

    /// Short machine-readable reason, used as a metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Disabled(_) => "disabled",
            Self::NoCapableModel(_) => "no_capable_model",
            Self::Load { .. } => "load_failed",
            Self::MemoryTimeout { .. } => "memory_timeout",
            Self::WaitTimeout(_) => "wait_timeout",
            Self::LoadAbandoned(_) => "load_abandoned",
            Self::ShuttingDown => "shutting_down",
        }
    }

    pub(crate) fn from_registry(model_id: &str, err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => Self::NotFound(id),
            RegistryError::Disabled(id) => Self::Disabled(id),
            other => Self::Load {
                model_id: model_id.to_string(),
                reason: other.to_string(),
            },
        }
    }

    pub(crate) fn from_model(model_id: &str, err: ModelError) -> Self {
        Self::Load {
            model_id: model_id.to_string(),
            reason: err.to_string(),
        }
    }
}
