// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model lifecycle: on-demand loading, single-flight deduplication,
//! memory-driven LRU eviction, idle reaping and orderly shutdown.

mod config;
mod error;
mod flight;
mod manager;
mod reaper;
mod state;
mod status;

pub use config::{CapabilityPreference, LifecycleConfig, LoadOptions};
pub use error::LifecycleError;
pub use manager::ModelManager;
pub use status::{ManagerStatus, ResidentSnapshot};
