//! Integration tests for capability-based model lookup.

use std::sync::Arc;
use std::time::Duration;

use sonance_core::lifecycle::{
    CapabilityPreference, LifecycleConfig, LifecycleError, LoadOptions, ModelManager,
};
use sonance_core::memory::SimulatedGpu;
use sonance_core::models::{Capability, ModelDescriptor, ModelRegistry, SimulatedModel};

fn register(
    registry: &ModelRegistry,
    gpu: &Arc<SimulatedGpu>,
    id: &str,
    memory_gb: f64,
    caps: Vec<Capability>,
    commercial_ok: bool,
) {
    registry
        .register(
            ModelDescriptor::new(
                id,
                id,
                memory_gb,
                caps,
                SimulatedModel::factory(id, memory_gb, gpu.clone()),
            )
            .with_commercial(commercial_ok),
        )
        .unwrap();
}

/// music: nc-music, com-music; sfx: nc-sfx; tts: disabled-tts.
fn setup(config: LifecycleConfig) -> (ModelManager, Arc<ModelRegistry>, Arc<SimulatedGpu>) {
    let gpu = Arc::new(SimulatedGpu::new(16.0));
    let registry = Arc::new(ModelRegistry::new());
    register(&registry, &gpu, "nc-music", 2.0, vec![Capability::Music], false);
    register(&registry, &gpu, "com-music", 2.0, vec![Capability::Music, Capability::Ambient], true);
    register(&registry, &gpu, "nc-sfx", 2.0, vec![Capability::Sfx], false);
    register(&registry, &gpu, "disabled-tts", 1.0, vec![Capability::Tts], true);
    registry.set_enabled("disabled-tts", false);
    let manager = ModelManager::new(registry.clone(), gpu.clone(), config);
    (manager, registry, gpu)
}

fn test_config() -> LifecycleConfig {
    LifecycleConfig {
        min_free_gb: 0.0,
        cleanup_interval: Duration::from_secs(3600),
        memory_poll_interval: Duration::from_millis(20),
        default_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_first_candidate_in_registration_order() {
    let (manager, _registry, _gpu) = setup(test_config());

    let model = manager
        .get_model_for_capability(Capability::Music, CapabilityPreference::default())
        .await
        .unwrap();

    assert_eq!(model.model_id(), "nc-music");
    assert_eq!(manager.get_loaded_models(), vec!["nc-music"]);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_prefer_commercial_narrows_candidates() {
    let (manager, _registry, _gpu) = setup(test_config());
    let prefs = CapabilityPreference {
        prefer_loaded: true,
        prefer_commercial: true,
    };

    let model = manager
        .get_model_for_capability(Capability::Music, prefs)
        .await
        .unwrap();

    assert_eq!(model.model_id(), "com-music");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_prefer_commercial_falls_back_when_none_qualify() {
    let (manager, _registry, _gpu) = setup(test_config());
    let prefs = CapabilityPreference {
        prefer_loaded: true,
        prefer_commercial: true,
    };

    let model = manager
        .get_model_for_capability(Capability::Sfx, prefs)
        .await
        .unwrap();

    assert_eq!(model.model_id(), "nc-sfx");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_prefer_loaded_returns_resident_candidate() {
    let (manager, _registry, gpu) = setup(test_config());
    let resident = manager
        .get_model("com-music", LoadOptions::default())
        .await
        .unwrap();

    let model = manager
        .get_model_for_capability(Capability::Music, CapabilityPreference::default())
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&resident, &model));
    assert_eq!(gpu.allocation_count("nc-music"), 0);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_prefer_loaded_false_takes_first_candidate() {
    let (manager, _registry, _gpu) = setup(test_config());
    manager
        .get_model("com-music", LoadOptions::default())
        .await
        .unwrap();

    let prefs = CapabilityPreference {
        prefer_loaded: false,
        prefer_commercial: false,
    };
    let model = manager
        .get_model_for_capability(Capability::Music, prefs)
        .await
        .unwrap();

    assert_eq!(model.model_id(), "nc-music");
    assert_eq!(manager.get_loaded_models(), vec!["com-music", "nc-music"]);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_prefer_loaded_hit_skips_memory_check() {
    // Headroom larger than the device: every fresh load must time out.
    let config = LifecycleConfig {
        min_free_gb: 64.0,
        default_timeout: Duration::from_millis(100),
        ..test_config()
    };
    let (manager, _registry, _gpu) = setup(config);

    assert!(manager
        .get_model_for_capability(Capability::Ambient, CapabilityPreference::default())
        .await
        .is_none());

    manager
        .get_model("com-music", LoadOptions::default().no_wait())
        .await
        .unwrap();

    let model = manager
        .get_model_for_capability(Capability::Ambient, CapabilityPreference::default())
        .await;
    assert_eq!(model.unwrap().model_id(), "com-music");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_no_enabled_candidate() {
    let (manager, registry, _gpu) = setup(test_config());

    assert!(manager
        .get_model_for_capability(Capability::Tts, CapabilityPreference::default())
        .await
        .is_none());
    let err = manager
        .acquire_for_capability(Capability::Tts, CapabilityPreference::default())
        .await
        .err().unwrap();
    assert!(matches!(err, LifecycleError::NoCapableModel(Capability::Tts)));

    registry.set_enabled("disabled-tts", true);
    let model = manager
        .get_model_for_capability(Capability::Tts, CapabilityPreference::default())
        .await
        .unwrap();
    assert_eq!(model.model_id(), "disabled-tts");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_lookup_is_deterministic() {
    let (manager, _registry, _gpu) = setup(test_config());

    for _ in 0..5 {
        let model = manager
            .get_model_for_capability(Capability::Music, CapabilityPreference::default())
            .await
            .unwrap();
        assert_eq!(model.model_id(), "nc-music");
    }

    manager.shutdown().await;
}
