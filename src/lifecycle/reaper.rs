// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Background idle reaper.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::manager::ManagerInner;

/// Spawn the reaper loop. Cancelling `shutdown` interrupts the sleep
/// immediately; a pass already in progress runs to completion.
pub(super) fn spawn_reaper(
    inner: Arc<ManagerInner>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(interval_ms = interval.as_millis() as u64, "idle reaper started");
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    tracing::debug!("idle reaper: shutdown signal received");
                    break;
                }
                () = tokio::time::sleep(interval) => {
                    let reaped = inner.reap_idle().await;
                    if reaped > 0 {
                        tracing::info!(reaped, "idle reaper pass complete");
                    }
                }
            }
        }
    })
}
