// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! The contract every generative audio model implements.
//!
//! The lifecycle manager only ever calls `load`, `unload` and `is_loaded`;
//! `generate` and `status` belong to job runners and status endpoints.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::descriptor::ModelConfig;

/// Errors raised by a model while loading or unloading.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Load failed: {0}")]
    LoadFailed(String),

    #[error("Unload failed: {0}")]
    UnloadFailed(String),

    #[error("Model not loaded: {0}")]
    NotLoaded(String),

    #[error("Invalid model config: {0}")]
    Config(String),
}

/// Errors raised by `AudioModel::generate`.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Model not loaded: {0}")]
    NotLoaded(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input to a single generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub duration_secs: f32,
    pub output_path: PathBuf,
    /// Model-specific options (seed, guidance, voice...).
    #[serde(default)]
    pub options: ModelConfig,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, duration_secs: f32, output_path: PathBuf) -> Self {
        Self {
            prompt: prompt.into(),
            duration_secs,
            output_path,
            options: ModelConfig::new(),
        }
    }
}

/// Result of a successful generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub output_path: PathBuf,
    pub duration_secs: f32,
    pub sample_rate: u32,
    pub samples: u64,
}

/// Point-in-time view of an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub model_id: String,
    pub loaded: bool,
    pub device: String,
    pub memory_gb: f64,
}

/// A generative audio model instance.
///
/// `unload` must release device memory before returning; the manager
/// never relies on drop order to reclaim accelerator memory.
#[async_trait]
pub trait AudioModel: Send + Sync {
    fn model_id(&self) -> &str;

    async fn load(&self) -> Result<(), ModelError>;

    async fn unload(&self) -> Result<(), ModelError>;

    fn is_loaded(&self) -> bool;

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError>;

    fn status(&self) -> ModelStatus;
}

/// Shared handle to a resident instance.
pub type SharedModel = Arc<dyn AudioModel>;
