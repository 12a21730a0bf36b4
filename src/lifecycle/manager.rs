// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model lifecycle manager.
//!
//! Loads instances on demand, keeps at most one resident instance per
//! model id, evicts least-recently-used instances when the memory probe
//! reports a shortfall, and reaps idle instances in the background.
//!
//! # Locking
//!
//! All residency and in-flight transitions happen under a single
//! `parking_lot::Mutex` that is never held across an `.await`. Instance
//! teardown (`unload()`) always runs after the bookkeeping has been
//! removed and the lock released.
//!
//! LRU selection reads a snapshot of `last_used` values. A cache hit
//! racing with an eviction can lose, so a just-used instance may
//! occasionally be evicted.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::config::{CapabilityPreference, LifecycleConfig, LoadOptions};
use super::error::LifecycleError;
use super::flight::FlightGuard;
use super::reaper::spawn_reaper;
use super::state::{EvictionReason, LoadState, ManagerState, ResidentInstance};
use super::status::{ManagerStatus, ResidentSnapshot};
use crate::memory::MemoryProbe;
use crate::models::{Capability, ModelRegistry, SharedModel};
use crate::telemetry::{self, ModelSpan, SpanExt};

const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(10);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

enum Claim {
    Hit(SharedModel),
    Wait(watch::Receiver<LoadState>),
    Load(watch::Sender<LoadState>),
}

/// State shared between the manager handle and the reaper task.
pub(crate) struct ManagerInner {
    registry: Arc<ModelRegistry>,
    probe: Arc<dyn MemoryProbe>,
    config: LifecycleConfig,
    pub(super) state: Mutex<ManagerState>,
    touch_seq: AtomicU64,
    reaper_cycles: AtomicU64,
}

impl ManagerInner {
    fn next_seq(&self) -> u64 {
        self.touch_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Decide, under one critical section, whether this caller hits the
    /// cache, waits for another loader, or becomes the loader.
    fn claim(&self, model_id: &str) -> Result<Claim, LifecycleError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(LifecycleError::ShuttingDown);
        }
        let seq = self.next_seq();
        if let Some(resident) = state.resident.get_mut(model_id) {
            resident.touch(seq);
            return Ok(Claim::Hit(resident.instance.clone()));
        }
        if let Some(rx) = state.in_flight.get(model_id) {
            return Ok(Claim::Wait(rx.clone()));
        }
        let (tx, rx) = watch::channel(LoadState::Pending);
        state.in_flight.insert(model_id.to_string(), rx);
        Ok(Claim::Load(tx))
    }

    async fn acquire(
        &self,
        model_id: &str,
        options: &LoadOptions,
    ) -> Result<SharedModel, LifecycleError> {
        let timeout = options.timeout.unwrap_or(self.config.default_timeout);
        let deadline = Instant::now() + timeout;

        loop {
            match self.claim(model_id)? {
                Claim::Hit(instance) => {
                    telemetry::record_cache_hit(model_id);
                    return Ok(instance);
                }
                Claim::Wait(rx) => {
                    tracing::debug!(model_id, "waiting for in-flight load");
                    match wait_for_load(rx, deadline).await {
                        // Now resident; the next claim is a cache hit.
                        Some(LoadState::Ready) => continue,
                        Some(_) => {
                            return Err(LifecycleError::LoadAbandoned(model_id.to_string()))
                        }
                        None => return Err(LifecycleError::WaitTimeout(model_id.to_string())),
                    }
                }
                Claim::Load(tx) => {
                    let guard = FlightGuard::new(self, model_id, tx);
                    let span = ModelSpan::load(model_id);
                    let result = self
                        .load_fresh(guard, options, deadline)
                        .instrument(span.clone())
                        .await;
                    span.record_result(&result);
                    return result;
                }
            }
        }
    }

    async fn load_fresh(
        &self,
        guard: FlightGuard<'_>,
        options: &LoadOptions,
        deadline: Instant,
    ) -> Result<SharedModel, LifecycleError> {
        let model_id = guard.model_id().to_string();
        let descriptor = self
            .registry
            .get(&model_id)
            .ok_or_else(|| LifecycleError::NotFound(model_id.clone()))?;
        if !descriptor.enabled {
            return Err(LifecycleError::Disabled(model_id));
        }

        let required_gb = descriptor.memory_gb + self.config.min_free_gb;
        self.enforce_capacity().await;

        if options.wait_for_memory {
            self.wait_for_memory(&model_id, required_gb, deadline).await?;
        } else {
            let available_gb = self.make_room(required_gb).await;
            if available_gb < required_gb {
                tracing::warn!(
                    model_id = %model_id,
                    required_gb,
                    available_gb,
                    "loading without full memory budget"
                );
            }
        }

        let instance = self
            .registry
            .create_instance(&model_id, options.overrides.as_ref())
            .map_err(|e| LifecycleError::from_registry(&model_id, e))?;

        let started = Instant::now();
        instance
            .load()
            .await
            .map_err(|e| LifecycleError::from_model(&model_id, e))?;
        let elapsed = started.elapsed();

        let instance: SharedModel = Arc::from(instance);
        let resident = ResidentInstance::new(
            model_id.clone(),
            descriptor.memory_gb,
            instance.clone(),
            self.next_seq(),
        );

        if let Err(resident) = guard.publish(resident) {
            tracing::info!(model_id = %model_id, "manager closed during load, discarding instance");
            self.teardown(resident, EvictionReason::Shutdown).await;
            return Err(LifecycleError::ShuttingDown);
        }

        // The cached reading predates this allocation.
        self.probe.invalidate();
        telemetry::record_load(&model_id, elapsed);
        telemetry::record_resident_count(self.resident_count());
        tracing::info!(
            model_id = %model_id,
            memory_gb = descriptor.memory_gb,
            elapsed_ms = elapsed.as_millis() as u64,
            "model loaded"
        );
        Ok(instance)
    }

    /// Poll and evict until `required_gb` is free or the deadline passes.
    async fn wait_for_memory(
        &self,
        model_id: &str,
        required_gb: f64,
        deadline: Instant,
    ) -> Result<(), LifecycleError> {
        loop {
            let available_gb = self.make_room(required_gb).await;
            if available_gb >= required_gb {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(LifecycleError::MemoryTimeout {
                    model_id: model_id.to_string(),
                    required_gb,
                    available_gb,
                });
            }

            let pause = self.config.memory_poll_interval.min(deadline - now);
            tracing::debug!(
                model_id,
                required_gb,
                available_gb,
                pause_ms = pause.as_millis() as u64,
                "waiting for memory"
            );
            tokio::time::sleep(pause).await;
        }
    }

    /// Evict LRU instances one at a time until `required_gb` is free.
    /// Returns the last reading; gives up when nothing is left to evict.
    pub(super) async fn make_room(&self, required_gb: f64) -> f64 {
        loop {
            let available_gb = self.probe.available_memory_gb().await;
            telemetry::record_available_memory(available_gb);
            if available_gb >= required_gb {
                return available_gb;
            }

            let victim = self.state.lock().take_lru();
            let Some(victim) = victim else {
                tracing::debug!(required_gb, available_gb, "nothing left to evict");
                return available_gb;
            };

            tracing::info!(
                model_id = %victim.model_id,
                required_gb,
                available_gb,
                "evicting least recently used model"
            );
            self.teardown(victim, EvictionReason::Lru).await;
        }
    }

    /// Evict LRU instances while the resident count is at the cap.
    async fn enforce_capacity(&self) {
        let cap = self.config.max_loaded_models.max(1);
        loop {
            let victim = {
                let mut state = self.state.lock();
                if state.resident.len() < cap {
                    None
                } else {
                    state.take_lru()
                }
            };
            let Some(victim) = victim else { break };
            tracing::info!(
                model_id = %victim.model_id,
                max_loaded_models = cap,
                "resident cap reached, evicting least recently used model"
            );
            self.teardown(victim, EvictionReason::Capacity).await;
        }
    }

    /// Unload an instance whose bookkeeping is already gone. Errors and
    /// panics from `unload()` are logged, never propagated.
    async fn teardown(&self, resident: ResidentInstance, reason: EvictionReason) {
        let model_id = resident.model_id;
        let span = ModelSpan::evict(&model_id, reason.as_str());
        let outcome = AssertUnwindSafe(resident.instance.unload())
            .catch_unwind()
            .instrument(span.clone())
            .await;

        let result = span.in_scope(|| match outcome {
            Ok(Ok(())) => {
                tracing::info!(
                    model_id = %model_id,
                    reason = reason.as_str(),
                    use_count = resident.use_count,
                    "model unloaded"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    model_id = %model_id,
                    reason = reason.as_str(),
                    error = %e,
                    "unload failed, model forgotten anyway"
                );
                Err(e.to_string())
            }
            Err(_) => {
                tracing::error!(
                    model_id = %model_id,
                    reason = reason.as_str(),
                    "unload panicked, model forgotten anyway"
                );
                Err("unload panicked".to_string())
            }
        });
        span.record_result(&result);

        self.probe.clear_device_cache();
        self.probe.invalidate();
        telemetry::record_eviction(&model_id, reason.as_str());
        telemetry::record_resident_count(self.resident_count());
    }

    async fn remove_resident(&self, model_id: &str, reason: EvictionReason) -> bool {
        let removed = self.state.lock().resident.remove(model_id);
        match removed {
            Some(resident) => {
                self.teardown(resident, reason).await;
                true
            }
            None => false,
        }
    }

    async fn unload_all(&self, reason: EvictionReason) -> usize {
        let ids = self.resident_ids();
        let mut unloaded = 0;
        for id in ids {
            if self.remove_resident(&id, reason).await {
                unloaded += 1;
            }
        }
        unloaded
    }

    /// One reaper pass: unload everything idle past the timeout.
    pub(super) async fn reap_idle(&self) -> usize {
        self.reaper_cycles.fetch_add(1, Ordering::Relaxed);
        let idle = self
            .state
            .lock()
            .take_idle(Instant::now(), self.config.idle_timeout);
        let reaped = idle.len();
        for resident in idle {
            tracing::info!(
                model_id = %resident.model_id,
                idle_secs = resident.last_used.elapsed().as_secs_f64(),
                "reaping idle model"
            );
            self.teardown(resident, EvictionReason::Idle).await;
        }
        reaped
    }

    async fn acquire_for_capability(
        &self,
        capability: Capability,
        prefs: CapabilityPreference,
        options: &LoadOptions,
    ) -> Result<SharedModel, LifecycleError> {
        let mut candidates = self.registry.list_by_capability(capability, true);
        if candidates.is_empty() {
            return Err(LifecycleError::NoCapableModel(capability));
        }

        if prefs.prefer_commercial {
            let safe: HashSet<String> =
                self.registry.list_commercial_safe(true).into_iter().collect();
            let narrowed: Vec<String> = candidates
                .iter()
                .filter(|id| safe.contains(*id))
                .cloned()
                .collect();
            if !narrowed.is_empty() {
                candidates = narrowed;
            }
        }

        if prefs.prefer_loaded {
            // Resident candidates skip the memory budget entirely.
            let hit = {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(LifecycleError::ShuttingDown);
                }
                let seq = self.next_seq();
                let mut hit = None;
                for id in &candidates {
                    if let Some(resident) = state.resident.get_mut(id) {
                        resident.touch(seq);
                        hit = Some((id.clone(), resident.instance.clone()));
                        break;
                    }
                }
                hit
            };
            if let Some((id, instance)) = hit {
                telemetry::record_cache_hit(&id);
                return Ok(instance);
            }
        }

        self.acquire(&candidates[0], options).await
    }

    fn resident_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().resident.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn resident_count(&self) -> usize {
        self.state.lock().resident.len()
    }

    async fn status(&self) -> ManagerStatus {
        let (resident, in_flight, shutting_down) = {
            let state = self.state.lock();
            let mut resident: Vec<ResidentSnapshot> = state
                .resident
                .values()
                .map(|r| ResidentSnapshot {
                    model_id: r.model_id.clone(),
                    memory_gb: r.memory_gb,
                    loaded_at: r.loaded_at,
                    last_used_at: r.last_used_at,
                    idle_secs: r.last_used.elapsed().as_secs_f64(),
                    use_count: r.use_count,
                })
                .collect();
            resident.sort_by(|a, b| a.model_id.cmp(&b.model_id));
            let mut in_flight: Vec<String> = state.in_flight.keys().cloned().collect();
            in_flight.sort();
            (resident, in_flight, state.closed)
        };

        let resident_memory_gb = resident.iter().map(|r| r.memory_gb).sum();
        ManagerStatus {
            resident,
            in_flight,
            descriptors: self.registry.describe_all(),
            enabled: self.registry.list_enabled(),
            available_memory_gb: self.probe.available_memory_gb().await,
            resident_memory_gb,
            reaper_cycles: self.reaper_cycles.load(Ordering::Relaxed),
            shutting_down,
            config: self.config.clone(),
        }
    }
}

/// Wait for another caller's load to resolve. `None` on timeout.
async fn wait_for_load(mut rx: watch::Receiver<LoadState>, deadline: Instant) -> Option<LoadState> {
    tokio::time::timeout_at(deadline, async move {
        let outcome = match rx.wait_for(|s| *s != LoadState::Pending).await {
            Ok(state) => *state,
            // Loader vanished without reporting.
            Err(_) => LoadState::Failed,
        };
        outcome
    })
    .await
    .ok()
}

/// Loads, caches and evicts model instances.
///
/// Construct once at process startup and share it behind an `Arc`.
/// Construction spawns the idle reaper, so it must happen inside a tokio
/// runtime.
pub struct ModelManager {
    inner: Arc<ManagerInner>,
    cancel: CancellationToken,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl ModelManager {
    pub fn new(
        registry: Arc<ModelRegistry>,
        probe: Arc<dyn MemoryProbe>,
        mut config: LifecycleConfig,
    ) -> Self {
        config.cleanup_interval = config.cleanup_interval.max(MIN_CLEANUP_INTERVAL);
        config.memory_poll_interval = config.memory_poll_interval.max(MIN_POLL_INTERVAL);
        config.min_free_gb = config.min_free_gb.max(0.0);

        let interval = config.cleanup_interval;
        let inner = Arc::new(ManagerInner {
            registry,
            probe,
            config,
            state: Mutex::new(ManagerState::default()),
            touch_seq: AtomicU64::new(0),
            reaper_cycles: AtomicU64::new(0),
        });
        let cancel = CancellationToken::new();
        let reaper = spawn_reaper(inner.clone(), interval, cancel.clone());

        Self {
            inner,
            cancel,
            reaper: Mutex::new(Some(reaper)),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.inner.config
    }

    /// Resident instance of `model_id`, loading it if needed.
    ///
    /// Every failure is logged and reported as `None`; the manager stays
    /// usable and the next call retries the load.
    pub async fn get_model(&self, model_id: &str, options: LoadOptions) -> Option<SharedModel> {
        match self.inner.acquire(model_id, &options).await {
            Ok(instance) => Some(instance),
            Err(e) => {
                log_unavailable(model_id, &e);
                None
            }
        }
    }

    /// Like [`Self::get_model`] but keeps the failure reason.
    pub async fn acquire(
        &self,
        model_id: &str,
        options: LoadOptions,
    ) -> Result<SharedModel, LifecycleError> {
        self.inner.acquire(model_id, &options).await
    }

    /// Some enabled model providing `capability`. Deterministic for a
    /// fixed registration order and residency state.
    pub async fn get_model_for_capability(
        &self,
        capability: Capability,
        prefs: CapabilityPreference,
    ) -> Option<SharedModel> {
        match self
            .inner
            .acquire_for_capability(capability, prefs, &LoadOptions::default())
            .await
        {
            Ok(instance) => Some(instance),
            Err(e) => {
                log_unavailable(capability.as_str(), &e);
                None
            }
        }
    }

    /// Like [`Self::get_model_for_capability`] but keeps the failure reason.
    pub async fn acquire_for_capability(
        &self,
        capability: Capability,
        prefs: CapabilityPreference,
    ) -> Result<SharedModel, LifecycleError> {
        self.acquire_for_capability_with(capability, prefs, LoadOptions::default())
            .await
    }

    /// Capability lookup whose fallback load uses `options`. A resident
    /// hit ignores them.
    pub async fn acquire_for_capability_with(
        &self,
        capability: Capability,
        prefs: CapabilityPreference,
        options: LoadOptions,
    ) -> Result<SharedModel, LifecycleError> {
        self.inner
            .acquire_for_capability(capability, prefs, &options)
            .await
    }

    /// Unload `model_id`. Returns false if it was not resident.
    pub async fn unload_model(&self, model_id: &str) -> bool {
        self.inner
            .remove_resident(model_id, EvictionReason::Explicit)
            .await
    }

    /// Unload every resident instance; returns how many were unloaded.
    pub async fn unload_all(&self) -> usize {
        self.inner.unload_all(EvictionReason::Explicit).await
    }

    /// Evict LRU instances until `required_gb` is free or none remain.
    /// Returns the final memory reading.
    pub async fn make_room(&self, required_gb: f64) -> f64 {
        self.inner.make_room(required_gb).await
    }

    /// Run one idle-reaper pass immediately.
    pub async fn reap_idle(&self) -> usize {
        self.inner.reap_idle().await
    }

    pub async fn get_status(&self) -> ManagerStatus {
        self.inner.status().await
    }

    /// Ids of resident instances, sorted.
    pub fn get_loaded_models(&self) -> Vec<String> {
        self.inner.resident_ids()
    }

    pub fn is_loaded(&self, model_id: &str) -> bool {
        self.inner.state.lock().resident.contains_key(model_id)
    }

    /// Ids with a load in progress, sorted.
    pub fn in_flight(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.state.lock().in_flight.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Completed reaper passes, including ones run via [`Self::reap_idle`].
    pub fn reaper_cycles(&self) -> u64 {
        self.inner.reaper_cycles.load(Ordering::Relaxed)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Stop accepting requests, stop the reaper and wait for its current
    /// cycle, then unload everything. Returns the number unloaded.
    pub async fn shutdown(&self) -> usize {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return 0;
            }
            state.closed = true;
        }
        tracing::info!("model manager shutting down");

        self.cancel.cancel();
        let reaper = self.reaper.lock().take();
        if let Some(handle) = reaper {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "idle reaper ended abnormally");
            }
        }

        let unloaded = self.inner.unload_all(EvictionReason::Shutdown).await;
        tracing::info!(unloaded, "model manager stopped");
        unloaded
    }
}

impl Drop for ModelManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn log_unavailable(target: &str, err: &LifecycleError) {
    telemetry::record_load_failure(target, err.reason());
    tracing::warn!(
        target_model = target,
        reason = err.reason(),
        retryable = err.is_retryable(),
        error = %err,
        "model unavailable"
    );
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
