//! Lifecycle manager benchmarks.
//!
//! Measures the cache-hit path, capability lookup, and registry listing.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use sonance_core::lifecycle::{CapabilityPreference, LifecycleConfig, LoadOptions, ModelManager};
use sonance_core::memory::SimulatedGpu;
use sonance_core::models::{Capability, ModelDescriptor, ModelRegistry, SimulatedModel};

fn build(rt: &tokio::runtime::Runtime, models: usize) -> (Arc<ModelManager>, Arc<ModelRegistry>) {
    let gpu = Arc::new(SimulatedGpu::new(1024.0));
    let registry = Arc::new(ModelRegistry::new());
    for i in 0..models {
        let id = format!("model-{}", i);
        let cap = Capability::ALL[i % Capability::ALL.len()];
        registry
            .register(
                ModelDescriptor::new(
                    id.clone(),
                    id.clone(),
                    1.0,
                    vec![cap],
                    SimulatedModel::factory(id, 1.0, gpu.clone()),
                )
                .with_commercial(i % 2 == 0),
            )
            .unwrap();
    }
    let config = LifecycleConfig {
        min_free_gb: 0.0,
        max_loaded_models: models.max(1),
        cleanup_interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let manager = rt.block_on(async {
        Arc::new(ModelManager::new(registry.clone(), gpu, config))
    });
    (manager, registry)
}

fn bench_cache_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("cache_hit");

    for models in [1usize, 8, 32] {
        let (manager, _registry) = build(&rt, models);
        rt.block_on(async {
            for i in 0..models {
                manager
                    .get_model(&format!("model-{}", i), LoadOptions::default())
                    .await
                    .unwrap();
            }
        });

        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::new("get_model", models), |b| {
            b.iter(|| {
                rt.block_on(async {
                    black_box(manager.get_model("model-0", LoadOptions::default()).await)
                })
            })
        });
        rt.block_on(manager.shutdown());
    }

    group.finish();
}

fn bench_capability_lookup(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("capability_lookup");

    for models in [4usize, 32] {
        let (manager, _registry) = build(&rt, models);
        rt.block_on(async {
            manager
                .get_model_for_capability(Capability::Music, CapabilityPreference::default())
                .await
                .unwrap();
        });

        let prefs = CapabilityPreference {
            prefer_loaded: true,
            prefer_commercial: true,
        };
        group.bench_function(BenchmarkId::new("prefer_loaded", models), |b| {
            b.iter(|| {
                rt.block_on(async {
                    black_box(
                        manager
                            .get_model_for_capability(Capability::Music, prefs)
                            .await,
                    )
                })
            })
        });
        rt.block_on(manager.shutdown());
    }

    group.finish();
}

fn bench_registry_listing(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (manager, registry) = build(&rt, 64);

    c.bench_function("list_by_capability_64", |b| {
        b.iter(|| black_box(registry.list_by_capability(black_box(Capability::Sfx), true)))
    });
    c.bench_function("describe_all_64", |b| {
        b.iter(|| black_box(registry.describe_all()))
    });

    rt.block_on(manager.shutdown());
}

criterion_group!(
    benches,
    bench_cache_hit,
    bench_capability_lookup,
    bench_registry_listing
);
criterion_main!(benches);
