// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Accelerator memory: free-memory probes and a simulated device.

mod probe;
mod simulated;

#[cfg(feature = "cuda")]
pub use probe::CudaDriver;
pub use probe::{parse_nvidia_smi_free, CachedMemoryProbe, MemoryProbe, MemorySource, NvidiaSmi};
pub use simulated::{SimulatedGpu, SimulatedGpuError};
