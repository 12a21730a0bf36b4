//! Integration tests for the model registry.

use std::sync::{Arc, Mutex};

use serde_json::json;
use sonance_core::memory::SimulatedGpu;
use sonance_core::models::{
    builtin_descriptors, register_builtins, Capability, ModelConfig, ModelDescriptor, ModelError,
    ModelFactory, ModelRegistry, RegistryError, SimulatedModel,
};

fn sim(id: &str, caps: Vec<Capability>, gpu: &Arc<SimulatedGpu>) -> ModelDescriptor {
    ModelDescriptor::new(id, id, 1.0, caps, SimulatedModel::factory(id, 1.0, gpu.clone()))
}

/// Factory that records the merged config it was called with.
fn recording_factory(gpu: &Arc<SimulatedGpu>, seen: Arc<Mutex<Vec<ModelConfig>>>) -> ModelFactory {
    let inner = SimulatedModel::factory("rec", 1.0, gpu.clone());
    Arc::new(move |config: &ModelConfig| {
        seen.lock().unwrap().push(config.clone());
        inner(config)
    })
}

#[test]
fn test_registration_order_is_preserved() {
    let gpu = Arc::new(SimulatedGpu::new(8.0));
    let registry = ModelRegistry::new();
    registry.register(sim("c", vec![Capability::Music], &gpu)).unwrap();
    registry.register(sim("a", vec![Capability::Music], &gpu)).unwrap();
    registry.register(sim("b", vec![Capability::Sfx], &gpu)).unwrap();

    assert_eq!(registry.list_enabled(), vec!["c", "a", "b"]);
    assert_eq!(registry.list_by_capability(Capability::Music, true), vec!["c", "a"]);
    assert_eq!(registry.count(), 3);
}

#[test]
fn test_replacement_keeps_position() {
    let gpu = Arc::new(SimulatedGpu::new(8.0));
    let registry = ModelRegistry::new();
    registry.register(sim("a", vec![Capability::Music], &gpu)).unwrap();
    registry.register(sim("b", vec![Capability::Music], &gpu)).unwrap();

    let replacement = ModelDescriptor::new(
        "a",
        "A v2",
        2.0,
        vec![Capability::Sfx],
        SimulatedModel::factory("a", 2.0, gpu.clone()),
    );
    registry.register(replacement).unwrap();

    assert_eq!(registry.count(), 2);
    assert_eq!(registry.list_enabled(), vec!["a", "b"]);
    let a = registry.get("a").unwrap();
    assert_eq!(a.display_name, "A v2");
    assert_eq!(registry.list_by_capability(Capability::Music, false), vec!["b"]);
    assert_eq!(registry.list_by_capability(Capability::Sfx, false), vec!["a"]);
}

#[test]
fn test_enabled_and_commercial_filters() {
    let gpu = Arc::new(SimulatedGpu::new(8.0));
    let registry = ModelRegistry::new();
    registry
        .register(sim("free", vec![Capability::Tts], &gpu).with_commercial(true))
        .unwrap();
    registry
        .register(sim("off", vec![Capability::Tts], &gpu).with_commercial(true).with_enabled(false))
        .unwrap();
    registry.register(sim("nc", vec![Capability::Tts], &gpu)).unwrap();

    assert_eq!(registry.list_commercial_safe(true), vec!["free"]);
    assert_eq!(registry.list_commercial_safe(false), vec!["free", "off"]);
    assert_eq!(registry.list_by_capability(Capability::Tts, true), vec!["free", "nc"]);
    assert_eq!(registry.list_by_capability(Capability::Tts, false), vec!["free", "off", "nc"]);
}

#[test]
fn test_set_enabled() {
    let gpu = Arc::new(SimulatedGpu::new(8.0));
    let registry = ModelRegistry::new();
    registry.register(sim("a", vec![Capability::Music], &gpu)).unwrap();

    assert!(registry.set_enabled("a", false));
    assert!(registry.list_enabled().is_empty());
    assert!(!registry.get("a").unwrap().enabled);
    assert!(registry.set_enabled("a", true));
    assert_eq!(registry.list_enabled(), vec!["a"]);
    assert!(!registry.set_enabled("missing", true));
}

#[test]
fn test_create_instance_errors() {
    let gpu = Arc::new(SimulatedGpu::new(8.0));
    let registry = ModelRegistry::new();
    registry
        .register(sim("off", vec![Capability::Music], &gpu).with_enabled(false))
        .unwrap();
    let failing: ModelFactory = Arc::new(|_| Err(ModelError::Config("no weights".into())));
    registry
        .register(ModelDescriptor::new("bad", "Bad", 1.0, vec![Capability::Sfx], failing))
        .unwrap();

    assert!(matches!(
        registry.create_instance("missing", None),
        Err(RegistryError::NotFound(_))
    ));
    assert!(matches!(
        registry.create_instance("off", None),
        Err(RegistryError::Disabled(_))
    ));
    match registry.create_instance("bad", None) {
        Err(RegistryError::Instantiate { model_id, source }) => {
            assert_eq!(model_id, "bad");
            assert!(source.to_string().contains("no weights"));
        }
        other => panic!("expected Instantiate, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_create_instance_merges_overrides() {
    let gpu = Arc::new(SimulatedGpu::new(8.0));
    let registry = ModelRegistry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let defaults = json!({"load_delay_ms": 10, "tone_hz": 220.0})
        .as_object()
        .cloned()
        .unwrap();
    registry
        .register(
            ModelDescriptor::new(
                "rec",
                "Recorder",
                1.0,
                vec![Capability::Ambient],
                recording_factory(&gpu, seen.clone()),
            )
            .with_default_config(defaults),
        )
        .unwrap();

    let overrides = json!({"tone_hz": 330.0}).as_object().cloned().unwrap();
    let instance = registry.create_instance("rec", Some(&overrides)).unwrap();

    assert!(!instance.is_loaded());
    let configs = seen.lock().unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0]["tone_hz"], json!(330.0));
    assert_eq!(configs[0]["load_delay_ms"], json!(10));
}

#[test]
fn test_invalid_descriptors_are_rejected() {
    let gpu = Arc::new(SimulatedGpu::new(8.0));
    let registry = ModelRegistry::new();

    let no_caps = sim("empty", vec![], &gpu);
    assert!(matches!(registry.register(no_caps), Err(RegistryError::Invalid(_))));

    let negative = ModelDescriptor::new(
        "neg",
        "Neg",
        -1.0,
        vec![Capability::Music],
        SimulatedModel::factory("neg", 1.0, gpu.clone()),
    );
    assert!(matches!(registry.register(negative), Err(RegistryError::Invalid(_))));

    let blank = sim("  ", vec![Capability::Music], &gpu);
    assert!(matches!(registry.register(blank), Err(RegistryError::Invalid(_))));

    assert_eq!(registry.count(), 0);
}

#[test]
fn test_builtin_table() {
    let gpu = Arc::new(SimulatedGpu::new(24.0));
    let registry = ModelRegistry::new();

    let count = register_builtins(&registry, &gpu).unwrap();

    assert_eq!(count, builtin_descriptors(&gpu).len());
    assert_eq!(registry.count(), count);
    for cap in Capability::ALL {
        assert!(
            !registry.list_by_capability(cap, true).is_empty(),
            "no builtin for {}",
            cap
        );
    }
    assert!(!registry.list_commercial_safe(true).is_empty());
}

#[test]
fn test_describe_all_serializes() {
    let gpu = Arc::new(SimulatedGpu::new(24.0));
    let registry = ModelRegistry::new();
    register_builtins(&registry, &gpu).unwrap();

    let infos = registry.describe_all();
    let text = serde_json::to_string(&infos).unwrap();
    assert!(text.contains("\"musicgen-small\""));
    assert!(text.contains("\"tts\""));
}
