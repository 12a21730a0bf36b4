//! Integration tests for TOML model catalogs.

use std::io::Write;
use std::sync::Arc;

use sonance_core::memory::SimulatedGpu;
use sonance_core::models::{
    register_builtins, Backend, Capability, Catalog, CatalogError, ModelRegistry,
};

const CATALOG: &str = r#"
[[model]]
id = "riffusion"
display_name = "Riffusion"
memory_gb = 3.5
capabilities = ["music", "ambient"]
commercial_ok = true

[model.config]
load_delay_ms = 0
tone_hz = 261.6

[[model]]
id = "foley-lite"
display_name = "Foley Lite"
memory_gb = 1.0
capabilities = ["sfx"]
enabled = false
backend = "simulated"

[overrides.musicgen-medium]
enabled = false
"#;

#[test]
fn test_parse_catalog() {
    let catalog = Catalog::from_toml(CATALOG).unwrap();

    assert_eq!(catalog.models.len(), 2);
    let riff = &catalog.models[0];
    assert_eq!(riff.id, "riffusion");
    assert_eq!(riff.capabilities, vec![Capability::Music, Capability::Ambient]);
    assert!(riff.commercial_ok);
    assert!(riff.enabled);
    assert_eq!(riff.backend, Backend::Simulated);
    assert_eq!(riff.config["tone_hz"], serde_json::json!(261.6));

    assert!(!catalog.models[1].enabled);
    assert_eq!(catalog.overrides["musicgen-medium"].enabled, Some(false));
}

#[test]
fn test_apply_over_builtins() {
    let gpu = Arc::new(SimulatedGpu::new(24.0));
    let registry = ModelRegistry::new();
    let builtins = register_builtins(&registry, &gpu).unwrap();

    let catalog = Catalog::from_toml(CATALOG).unwrap();
    assert_eq!(catalog.apply(&registry, &gpu).unwrap(), 2);

    assert_eq!(registry.count(), builtins + 2);
    assert!(!registry.get("musicgen-medium").unwrap().enabled);
    assert!(!registry.list_enabled().contains(&"foley-lite".to_string()));
    assert!(registry
        .list_commercial_safe(true)
        .contains(&"riffusion".to_string()));

    let instance = registry.create_instance("riffusion", None).unwrap();
    assert_eq!(instance.model_id(), "riffusion");
}

#[test]
fn test_catalog_entry_replaces_builtin() {
    let gpu = Arc::new(SimulatedGpu::new(24.0));
    let registry = ModelRegistry::new();
    register_builtins(&registry, &gpu).unwrap();
    let first = registry.list_enabled()[0].clone();

    let toml = format!(
        r#"
[[model]]
id = "{}"
display_name = "Replaced"
memory_gb = 2.0
capabilities = ["tts"]
"#,
        first
    );
    Catalog::from_toml(&toml).unwrap().apply(&registry, &gpu).unwrap();

    assert_eq!(registry.list_enabled()[0], first);
    assert_eq!(registry.get(&first).unwrap().display_name, "Replaced");
}

#[test]
fn test_unknown_override_is_an_error() {
    let gpu = Arc::new(SimulatedGpu::new(24.0));
    let registry = ModelRegistry::new();
    let catalog = Catalog::from_toml("[overrides.nope]\nenabled = true\n").unwrap();

    assert!(matches!(
        catalog.apply(&registry, &gpu),
        Err(CatalogError::UnknownOverride(id)) if id == "nope"
    ));
}

#[test]
fn test_validation_failures() {
    let duplicate = r#"
[[model]]
id = "x"
display_name = "X"
memory_gb = 1.0
capabilities = ["music"]

[[model]]
id = "x"
display_name = "X again"
memory_gb = 1.0
capabilities = ["music"]
"#;
    assert!(matches!(Catalog::from_toml(duplicate), Err(CatalogError::Invalid(_))));

    let zero_memory = r#"
[[model]]
id = "z"
display_name = "Z"
memory_gb = 0.0
capabilities = ["sfx"]
"#;
    assert!(matches!(Catalog::from_toml(zero_memory), Err(CatalogError::Invalid(_))));

    let no_caps = r#"
[[model]]
id = "n"
display_name = "N"
memory_gb = 1.0
capabilities = []
"#;
    assert!(matches!(Catalog::from_toml(no_caps), Err(CatalogError::Invalid(_))));
}

#[test]
fn test_parse_failures() {
    let bad_backend = r#"
[[model]]
id = "o"
display_name = "O"
memory_gb = 1.0
capabilities = ["music"]
backend = "onnx"
"#;
    assert!(matches!(Catalog::from_toml(bad_backend), Err(CatalogError::Parse(_))));

    let bad_capability = r#"
[[model]]
id = "v"
display_name = "V"
memory_gb = 1.0
capabilities = ["video"]
"#;
    assert!(matches!(Catalog::from_toml(bad_capability), Err(CatalogError::Parse(_))));
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CATALOG.as_bytes()).unwrap();

    let catalog = Catalog::from_file(file.path()).unwrap();
    assert_eq!(catalog.models.len(), 2);

    let missing = Catalog::from_file(std::path::Path::new("/nonexistent/sonance.toml"));
    assert!(matches!(missing, Err(CatalogError::Io(_))));
}

#[test]
fn test_empty_catalog_is_valid() {
    let catalog = Catalog::from_toml("").unwrap();
    assert!(catalog.models.is_empty());
    assert!(catalog.overrides.is_empty());
}
