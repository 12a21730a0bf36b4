// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Probe CLI subcommand: one free-memory reading per source.

use std::time::Duration;

use crate::memory::{CachedMemoryProbe, MemoryProbe, MemorySource, NvidiaSmi};

/// Run `probe`. Returns 0 if any source answered, 1 otherwise.
pub async fn run_probe() -> i32 {
    #[allow(unused_mut)]
    let mut sources: Vec<Box<dyn MemorySource>> = vec![Box::new(NvidiaSmi::new())];
    #[cfg(feature = "cuda")]
    sources.push(Box::new(crate::memory::CudaDriver::new(0)));

    let mut answered = false;
    for source in &sources {
        match source.free_memory_gb().await {
            Some(gb) => {
                answered = true;
                println!("{:<12} {:>8.2} GB free", source.name(), gb);
            }
            None => println!("{:<12} {:>8}", source.name(), "unavailable"),
        }
    }

    let probe = CachedMemoryProbe::with_sources(sources, Duration::ZERO);
    println!("{:<12} {:>8.2} GB free", "effective", probe.available_memory_gb().await);

    if answered {
        0
    } else {
        1
    }
}
