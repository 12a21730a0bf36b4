// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Simulated accelerator with a fixed capacity.
//!
//! Backs the simulated model backend and deterministic eviction tests:
//! models reserve their footprint on load and release it on unload, and
//! the device doubles as the manager's memory probe.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use super::probe::MemoryProbe;

#[derive(Error, Debug, PartialEq)]
pub enum SimulatedGpuError {
    #[error("Simulated GPU out of memory: requested {requested_gb} GB, available {available_gb} GB")]
    OutOfMemory { requested_gb: f64, available_gb: f64 },

    #[error("Allocation already held by {0}")]
    AlreadyAllocated(String),

    #[error("No allocation held by {0}")]
    UnknownOwner(String),
}

#[derive(Default)]
struct SimState {
    allocations: HashMap<String, f64>,
    used_gb: f64,
    allocation_counts: HashMap<String, u64>,
}

/// Fixed-capacity device tracking per-owner allocations.
pub struct SimulatedGpu {
    capacity_gb: f64,
    state: Mutex<SimState>,
    cache_clears: AtomicU64,
}

impl SimulatedGpu {
    pub fn new(capacity_gb: f64) -> Self {
        Self {
            capacity_gb: capacity_gb.max(0.0),
            state: Mutex::new(SimState::default()),
            cache_clears: AtomicU64::new(0),
        }
    }

    pub fn capacity_gb(&self) -> f64 {
        self.capacity_gb
    }

    /// Reserve `size_gb` for `owner`.
    pub fn allocate(&self, owner: &str, size_gb: f64) -> Result<(), SimulatedGpuError> {
        let mut s = self.state.lock();
        if s.allocations.contains_key(owner) {
            return Err(SimulatedGpuError::AlreadyAllocated(owner.to_string()));
        }
        let available_gb = (self.capacity_gb - s.used_gb).max(0.0);
        if size_gb > available_gb + f64::EPSILON {
            return Err(SimulatedGpuError::OutOfMemory {
                requested_gb: size_gb,
                available_gb,
            });
        }
        s.allocations.insert(owner.to_string(), size_gb);
        s.used_gb += size_gb;
        *s.allocation_counts.entry(owner.to_string()).or_insert(0) += 1;
        Ok(())
    }

    /// Release the allocation held by `owner`.
    pub fn release(&self, owner: &str) -> Result<f64, SimulatedGpuError> {
        let mut s = self.state.lock();
        let size = s
            .allocations
            .remove(owner)
            .ok_or_else(|| SimulatedGpuError::UnknownOwner(owner.to_string()))?;
        s.used_gb = (s.used_gb - size).max(0.0);
        Ok(size)
    }

    pub fn used_gb(&self) -> f64 {
        self.state.lock().used_gb
    }

    pub fn free_gb(&self) -> f64 {
        (self.capacity_gb - self.used_gb()).max(0.0)
    }

    /// Owners currently holding memory, sorted.
    pub fn owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self.state.lock().allocations.keys().cloned().collect();
        owners.sort();
        owners
    }

    /// How many times `owner` has successfully allocated.
    pub fn allocation_count(&self, owner: &str) -> u64 {
        self.state
            .lock()
            .allocation_counts
            .get(owner)
            .copied()
            .unwrap_or(0)
    }

    pub fn cache_clears(&self) -> u64 {
        self.cache_clears.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MemoryProbe for SimulatedGpu {
    async fn available_memory_gb(&self) -> f64 {
        self.free_gb()
    }

    fn clear_device_cache(&self) {
        self.cache_clears.fetch_add(1, Ordering::Relaxed);
    }
}
