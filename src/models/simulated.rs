// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Simulated audio model backend.
//!
//! Reserves its declared footprint on a [`SimulatedGpu`] while loaded and
//! renders a quiet sine tone (or silence) as 16-bit mono WAV. Config keys:
//!
//! | Key | Default | Meaning |
//! |---|---|---|
//! | `load_delay_ms` | 0 | Simulated weight loading time |
//! | `unload_delay_ms` | 0 | Teardown time before memory is released |
//! | `fail_load` | false | Make `load()` fail |
//! | `fail_unload` | false | Make `unload()` fail after releasing memory |
//! | `sample_rate` | 32000 | Output sample rate |
//! | `tone_hz` | 440.0 | Tone frequency, 0 for silence |

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::descriptor::{ModelConfig, ModelFactory};
use super::instance::{
    AudioModel, GenerationError, GenerationOutput, GenerationRequest, ModelError, ModelStatus,
};
use crate::memory::SimulatedGpu;

const MAX_DURATION_SECS: f32 = 600.0;
const TONE_AMPLITUDE: f64 = 0.1;

/// Parsed backend settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedSettings {
    pub load_delay: Duration,
    pub unload_delay: Duration,
    pub fail_load: bool,
    pub fail_unload: bool,
    pub sample_rate: u32,
    pub tone_hz: f64,
}

impl Default for SimulatedSettings {
    fn default() -> Self {
        Self {
            load_delay: Duration::ZERO,
            unload_delay: Duration::ZERO,
            fail_load: false,
            fail_unload: false,
            sample_rate: 32_000,
            tone_hz: 440.0,
        }
    }
}

impl SimulatedSettings {
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let mut settings = Self::default();
        if let Some(v) = config.get("load_delay_ms") {
            let ms = v
                .as_u64()
                .ok_or_else(|| ModelError::Config("load_delay_ms must be an integer".into()))?;
            settings.load_delay = Duration::from_millis(ms);
        }
        if let Some(v) = config.get("unload_delay_ms") {
            let ms = v
                .as_u64()
                .ok_or_else(|| ModelError::Config("unload_delay_ms must be an integer".into()))?;
            settings.unload_delay = Duration::from_millis(ms);
        }
        if let Some(v) = config.get("fail_load") {
            settings.fail_load = v
                .as_bool()
                .ok_or_else(|| ModelError::Config("fail_load must be a boolean".into()))?;
        }
        if let Some(v) = config.get("fail_unload") {
            settings.fail_unload = v
                .as_bool()
                .ok_or_else(|| ModelError::Config("fail_unload must be a boolean".into()))?;
        }
        if let Some(v) = config.get("sample_rate") {
            let rate = v
                .as_u64()
                .filter(|r| (8_000..=192_000).contains(r))
                .ok_or_else(|| ModelError::Config("sample_rate must be 8000..=192000".into()))?;
            settings.sample_rate = rate as u32;
        }
        if let Some(v) = config.get("tone_hz") {
            settings.tone_hz = v
                .as_f64()
                .filter(|hz| *hz >= 0.0)
                .ok_or_else(|| ModelError::Config("tone_hz must be >= 0".into()))?;
        }
        Ok(settings)
    }
}

/// Model instance backed by a simulated device.
pub struct SimulatedModel {
    id: String,
    memory_gb: f64,
    settings: SimulatedSettings,
    gpu: Arc<SimulatedGpu>,
    loaded: AtomicBool,
    generations: AtomicU64,
}

impl SimulatedModel {
    pub fn new(
        id: impl Into<String>,
        memory_gb: f64,
        settings: SimulatedSettings,
        gpu: Arc<SimulatedGpu>,
    ) -> Self {
        Self {
            id: id.into(),
            memory_gb,
            settings,
            gpu,
            loaded: AtomicBool::new(false),
            generations: AtomicU64::new(0),
        }
    }

    /// Factory producing fresh instances of `id` on `gpu`.
    pub fn factory(id: impl Into<String>, memory_gb: f64, gpu: Arc<SimulatedGpu>) -> ModelFactory {
        let id = id.into();
        Arc::new(move |config: &ModelConfig| {
            let settings = SimulatedSettings::from_config(config)?;
            let model = SimulatedModel::new(id.clone(), memory_gb, settings, gpu.clone());
            Ok(Box::new(model) as Box<dyn AudioModel>)
        })
    }

    pub fn generation_count(&self) -> u64 {
        self.generations.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AudioModel for SimulatedModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn load(&self) -> Result<(), ModelError> {
        if self.is_loaded() {
            return Ok(());
        }
        if !self.settings.load_delay.is_zero() {
            tokio::time::sleep(self.settings.load_delay).await;
        }
        if self.settings.fail_load {
            return Err(ModelError::LoadFailed(format!("{}: simulated load failure", self.id)));
        }
        self.gpu
            .allocate(&self.id, self.memory_gb)
            .map_err(|e| ModelError::LoadFailed(format!("{}: {}", self.id, e)))?;
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unload(&self) -> Result<(), ModelError> {
        if !self.loaded.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if !self.settings.unload_delay.is_zero() {
            tokio::time::sleep(self.settings.unload_delay).await;
        }
        self.gpu
            .release(&self.id)
            .map_err(|e| ModelError::UnloadFailed(e.to_string()))?;
        if self.settings.fail_unload {
            return Err(ModelError::UnloadFailed(format!(
                "{}: simulated teardown failure",
                self.id
            )));
        }
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        if !self.is_loaded() {
            return Err(GenerationError::NotLoaded(self.id.clone()));
        }
        if request.prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("prompt cannot be empty".into()));
        }
        if !(request.duration_secs > 0.0 && request.duration_secs <= MAX_DURATION_SECS) {
            return Err(GenerationError::InvalidRequest(format!(
                "duration must be in (0, {}] seconds",
                MAX_DURATION_SECS
            )));
        }

        let path = request.output_path.clone();
        let rate = self.settings.sample_rate;
        let tone_hz = self.settings.tone_hz;
        let samples = (request.duration_secs as f64 * rate as f64).round() as u64;

        tokio::task::spawn_blocking(move || write_tone(&path, rate, tone_hz, samples))
            .await
            .map_err(|e| GenerationError::Backend(format!("render task failed: {}", e)))??;

        self.generations.fetch_add(1, Ordering::Relaxed);
        Ok(GenerationOutput {
            output_path: request.output_path.clone(),
            duration_secs: request.duration_secs,
            sample_rate: rate,
            samples,
        })
    }

    fn status(&self) -> ModelStatus {
        ModelStatus {
            model_id: self.id.clone(),
            loaded: self.is_loaded(),
            device: "simulated".to_string(),
            memory_gb: self.memory_gb,
        }
    }
}

fn write_tone(path: &Path, rate: u32, tone_hz: f64, samples: u64) -> Result<(), GenerationError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| GenerationError::Backend(format!("failed to create WAV: {}", e)))?;
    let step = 2.0 * std::f64::consts::PI * tone_hz / rate as f64;
    for n in 0..samples {
        let value = (n as f64 * step).sin() * TONE_AMPLITUDE * i16::MAX as f64;
        writer
            .write_sample(value as i16)
            .map_err(|e| GenerationError::Backend(format!("failed to write sample: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| GenerationError::Backend(format!("failed to finalize WAV: {}", e)))
}
