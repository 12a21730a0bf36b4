// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model catalogue: descriptors, the registry, the instance contract and
//! the simulated backend.

mod builtin;
mod catalog;
mod descriptor;
mod instance;
mod registry;
mod simulated;

pub use builtin::{builtin_descriptors, register_builtins};
pub use catalog::{Backend, Catalog, CatalogEntry, CatalogError, CatalogOverride};
pub use descriptor::{Capability, DescriptorInfo, ModelConfig, ModelDescriptor, ModelFactory};
pub use instance::{
    AudioModel, GenerationError, GenerationOutput, GenerationRequest, ModelError, ModelStatus,
    SharedModel,
};
pub use registry::{ModelRegistry, RegistryError};
pub use simulated::{SimulatedModel, SimulatedSettings};
