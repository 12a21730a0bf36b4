// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-flight load marker.
//!
//! The caller that claims a load holds a [`FlightGuard`]. Publishing the
//! loaded instance moves it into the resident map and wakes waiters;
//! dropping the guard on any other path (error, timeout, cancelled
//! future) clears the marker and reports failure.

use tokio::sync::watch;

use super::manager::ManagerInner;
use super::state::{LoadState, ResidentInstance};

pub(crate) struct FlightGuard<'a> {
    inner: &'a ManagerInner,
    model_id: String,
    tx: Option<watch::Sender<LoadState>>,
}

impl<'a> FlightGuard<'a> {
    pub fn new(inner: &'a ManagerInner, model_id: &str, tx: watch::Sender<LoadState>) -> Self {
        Self {
            inner,
            model_id: model_id.to_string(),
            tx: Some(tx),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Make `resident` visible and release waiters. Hands the instance
    /// back if the manager closed while it was loading.
    pub fn publish(mut self, resident: ResidentInstance) -> Result<(), ResidentInstance> {
        {
            let mut state = self.inner.state.lock();
            state.in_flight.remove(&self.model_id);
            if state.closed {
                drop(state);
                self.finish(LoadState::Failed);
                return Err(resident);
            }
            state.resident.insert(self.model_id.clone(), resident);
        }
        self.finish(LoadState::Ready);
        Ok(())
    }

    fn finish(&mut self, outcome: LoadState) {
        if let Some(tx) = self.tx.take() {
            // No receivers left is fine.
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.inner.state.lock().in_flight.remove(&self.model_id);
            self.finish(LoadState::Failed);
        }
    }
}
