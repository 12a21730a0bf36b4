// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Startup descriptor table.

use std::sync::Arc;

use super::descriptor::{Capability, ModelConfig, ModelDescriptor};
use super::registry::{ModelRegistry, RegistryError};
use super::simulated::SimulatedModel;
use crate::memory::SimulatedGpu;

struct BuiltinModel {
    id: &'static str,
    display_name: &'static str,
    memory_gb: f64,
    capabilities: &'static [Capability],
    commercial_ok: bool,
    load_delay_ms: u64,
}

const BUILTIN_MODELS: &[BuiltinModel] = &[
    BuiltinModel {
        id: "musicgen-small",
        display_name: "MusicGen Small",
        memory_gb: 4.0,
        capabilities: &[Capability::Music],
        commercial_ok: false,
        load_delay_ms: 1500,
    },
    BuiltinModel {
        id: "musicgen-medium",
        display_name: "MusicGen Medium",
        memory_gb: 8.0,
        capabilities: &[Capability::Music],
        commercial_ok: false,
        load_delay_ms: 3000,
    },
    BuiltinModel {
        id: "stable-audio-open",
        display_name: "Stable Audio Open",
        memory_gb: 6.0,
        capabilities: &[Capability::Music, Capability::Sfx, Capability::Ambient],
        commercial_ok: true,
        load_delay_ms: 2500,
    },
    BuiltinModel {
        id: "audiogen-medium",
        display_name: "AudioGen Medium",
        memory_gb: 5.0,
        capabilities: &[Capability::Sfx, Capability::Ambient],
        commercial_ok: false,
        load_delay_ms: 2000,
    },
    BuiltinModel {
        id: "bark",
        display_name: "Bark",
        memory_gb: 5.0,
        capabilities: &[Capability::Tts, Capability::Sfx],
        commercial_ok: true,
        load_delay_ms: 2000,
    },
    BuiltinModel {
        id: "piper",
        display_name: "Piper TTS",
        memory_gb: 0.5,
        capabilities: &[Capability::Tts],
        commercial_ok: true,
        load_delay_ms: 200,
    },
];

/// Descriptors registered at process startup, backed by `gpu`.
pub fn builtin_descriptors(gpu: &Arc<SimulatedGpu>) -> Vec<ModelDescriptor> {
    BUILTIN_MODELS
        .iter()
        .map(|m| {
            let mut defaults = ModelConfig::new();
            defaults.insert("load_delay_ms".into(), m.load_delay_ms.into());
            ModelDescriptor::new(
                m.id,
                m.display_name,
                m.memory_gb,
                m.capabilities.to_vec(),
                SimulatedModel::factory(m.id, m.memory_gb, gpu.clone()),
            )
            .with_commercial(m.commercial_ok)
            .with_default_config(defaults)
        })
        .collect()
}

/// Register every builtin descriptor.
pub fn register_builtins(
    registry: &ModelRegistry,
    gpu: &Arc<SimulatedGpu>,
) -> Result<usize, RegistryError> {
    let descriptors = builtin_descriptors(gpu);
    let count = descriptors.len();
    for descriptor in descriptors {
        registry.register(descriptor)?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_valid_and_unique() {
        let gpu = Arc::new(SimulatedGpu::new(16.0));
        let registry = ModelRegistry::new();
        let count = register_builtins(&registry, &gpu).unwrap();
        assert_eq!(registry.count(), count);
    }

    #[test]
    fn every_capability_has_a_builtin() {
        let gpu = Arc::new(SimulatedGpu::new(16.0));
        let registry = ModelRegistry::new();
        register_builtins(&registry, &gpu).unwrap();
        for cap in Capability::ALL {
            assert!(!registry.list_by_capability(cap, true).is_empty(), "no model for {}", cap);
        }
    }
}
