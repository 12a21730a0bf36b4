// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Accelerator memory probing.
//!
//! Readings come from the first source that answers (the `nvidia-smi`
//! tool, then the CUDA driver when built with `cuda`) and are cached for a
//! short TTL. When no source answers the probe reports `0.0`, which forces
//! eviction and waiting rather than optimistic overcommit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Source of free accelerator memory readings, injected into the manager.
#[async_trait]
pub trait MemoryProbe: Send + Sync {
    /// Free accelerator memory in GiB.
    async fn available_memory_gb(&self) -> f64;

    /// Drop any cached reading so the next query hits the device.
    fn invalidate(&self) {}

    /// Return cached allocator blocks to the device after an unload.
    fn clear_device_cache(&self) {}
}

/// One way of asking the device how much memory is free.
#[async_trait]
pub trait MemorySource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn free_memory_gb(&self) -> Option<f64>;
}

/// Queries `nvidia-smi` and sums free memory across all visible devices.
pub struct NvidiaSmi {
    binary: String,
}

impl NvidiaSmi {
    pub fn new() -> Self {
        Self::with_binary("nvidia-smi")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `--format=csv,noheader,nounits` output (MiB per line) into GiB.
pub fn parse_nvidia_smi_free(output: &str) -> Option<f64> {
    let mut total_mib = 0.0;
    let mut seen = false;
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mib: f64 = line.parse().ok()?;
        total_mib += mib;
        seen = true;
    }
    seen.then_some(total_mib / 1024.0)
}

#[async_trait]
impl MemorySource for NvidiaSmi {
    fn name(&self) -> &'static str {
        "nvidia-smi"
    }

    async fn free_memory_gb(&self) -> Option<f64> {
        let output = tokio::process::Command::new(&self.binary)
            .args(["--query-gpu=memory.free", "--format=csv,noheader,nounits"])
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        parse_nvidia_smi_free(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Runtime query through the CUDA driver API.
#[cfg(feature = "cuda")]
pub struct CudaDriver {
    ordinal: usize,
}

#[cfg(feature = "cuda")]
impl CudaDriver {
    pub fn new(ordinal: usize) -> Self {
        Self { ordinal }
    }
}

#[cfg(feature = "cuda")]
#[async_trait]
impl MemorySource for CudaDriver {
    fn name(&self) -> &'static str {
        "cuda-driver"
    }

    async fn free_memory_gb(&self) -> Option<f64> {
        let ordinal = self.ordinal;
        tokio::task::spawn_blocking(move || {
            let device = cudarc::driver::CudaDevice::new(ordinal).ok()?;
            device.bind_to_thread().ok()?;
            let (free, _total) = cudarc::driver::result::mem_get_info().ok()?;
            Some(free as f64 / (1024.0 * 1024.0 * 1024.0))
        })
        .await
        .ok()
        .flatten()
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedReading {
    at: Instant,
    epoch: u64,
    value_gb: f64,
}

/// Memory probe that walks a chain of sources and caches the answer.
pub struct CachedMemoryProbe {
    sources: Vec<Box<dyn MemorySource>>,
    ttl: Duration,
    // Held across the query so concurrent callers share one invocation.
    cache: Mutex<Option<CachedReading>>,
    // Bumped by `invalidate`; readings from an older epoch are stale.
    epoch: AtomicU64,
}

impl CachedMemoryProbe {
    /// Default chain: `nvidia-smi`, then the CUDA driver when available.
    pub fn new(ttl: Duration) -> Self {
        #[allow(unused_mut)]
        let mut sources: Vec<Box<dyn MemorySource>> = vec![Box::new(NvidiaSmi::new())];
        #[cfg(feature = "cuda")]
        sources.push(Box::new(CudaDriver::new(0)));
        Self::with_sources(sources, ttl)
    }

    pub fn with_sources(sources: Vec<Box<dyn MemorySource>>, ttl: Duration) -> Self {
        Self {
            sources,
            ttl,
            cache: Mutex::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    async fn query_sources(&self) -> f64 {
        for source in &self.sources {
            if let Some(value) = source.free_memory_gb().await {
                tracing::trace!(source = source.name(), available_gb = value, "memory probe");
                return value.max(0.0);
            }
            tracing::debug!(source = source.name(), "memory source unavailable");
        }
        tracing::warn!("no memory source answered, reporting 0 GB available");
        0.0
    }
}

#[async_trait]
impl MemoryProbe for CachedMemoryProbe {
    async fn available_memory_gb(&self) -> f64 {
        let mut cache = self.cache.lock().await;
        let epoch = self.epoch.load(Ordering::Acquire);
        if let Some(reading) = *cache {
            if reading.epoch == epoch && reading.at.elapsed() < self.ttl {
                return reading.value_gb;
            }
        }
        let value_gb = self.query_sources().await;
        // An invalidation during the query means the reading may predate
        // a release; hand it to this caller but do not cache it.
        if self.epoch.load(Ordering::Acquire) == epoch {
            *cache = Some(CachedReading {
                at: Instant::now(),
                epoch,
                value_gb,
            });
        } else {
            *cache = None;
        }
        value_gb
    }

    fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}
