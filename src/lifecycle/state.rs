// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared manager state: resident instances and in-flight loads.
//!
//! Both maps live behind one mutex so "is it resident" and "is it being
//! loaded" are always answered together.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::models::SharedModel;

/// Outcome broadcast by a loader to callers waiting on the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoadState {
    Pending,
    Ready,
    Failed,
}

/// Why a resident instance was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EvictionReason {
    Lru,
    Capacity,
    Idle,
    Explicit,
    Shutdown,
}

impl EvictionReason {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Capacity => "capacity",
            Self::Idle => "idle",
            Self::Explicit => "explicit",
            Self::Shutdown => "shutdown",
        }
    }
}

/// A loaded instance owned by the manager.
pub(crate) struct ResidentInstance {
    pub instance: SharedModel,
    pub model_id: String,
    pub memory_gb: f64,
    pub loaded_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub last_used: Instant,
    /// Tie-breaker for instances touched within the same clock tick.
    pub touch_seq: u64,
    pub use_count: u64,
}

impl ResidentInstance {
    /// A freshly loaded instance counts as one use.
    pub fn new(model_id: String, memory_gb: f64, instance: SharedModel, seq: u64) -> Self {
        let now = Utc::now();
        Self {
            instance,
            model_id,
            memory_gb,
            loaded_at: now,
            last_used_at: now,
            last_used: Instant::now(),
            touch_seq: seq,
            use_count: 1,
        }
    }

    pub fn touch(&mut self, seq: u64) {
        self.last_used_at = Utc::now();
        self.last_used = Instant::now();
        self.touch_seq = seq;
        self.use_count += 1;
    }

    fn lru_key(&self) -> (Instant, u64) {
        (self.last_used, self.touch_seq)
    }
}

#[derive(Default)]
pub(crate) struct ManagerState {
    pub resident: HashMap<String, ResidentInstance>,
    pub in_flight: HashMap<String, watch::Receiver<LoadState>>,
    pub closed: bool,
}

impl ManagerState {
    /// Remove and return the least recently used resident.
    pub fn take_lru(&mut self) -> Option<ResidentInstance> {
        let victim = self
            .resident
            .values()
            .min_by_key(|r| r.lru_key())
            .map(|r| r.model_id.clone())?;
        self.resident.remove(&victim)
    }

    /// Remove and return every resident idle for longer than `timeout`.
    pub fn take_idle(&mut self, now: Instant, timeout: Duration) -> Vec<ResidentInstance> {
        let expired: Vec<String> = self
            .resident
            .values()
            .filter(|r| now.saturating_duration_since(r.last_used) > timeout)
            .map(|r| r.model_id.clone())
            .collect();
        expired
            .iter()
            .filter_map(|id| self.resident.remove(id))
            .collect()
    }
}
