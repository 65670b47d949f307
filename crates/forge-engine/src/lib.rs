//! Forge Engine - Generation orchestration
//!
//! The engine accepts generation requests, routes them to model
//! backends under a shared GPU memory budget, retries transient
//! failures, deduplicates identical in-flight work, runs the platform
//! conformance pipeline on every result, and caches completed bundles
//! from deterministic backends.

pub mod cache;
pub mod engine;
pub mod governor;
pub mod registry;
pub mod scheduler;

pub use cache::{CacheStats, ResultCache};
pub use engine::ForgeEngine;
pub use governor::{GpuGovernor, LoadedModelInfo, UnloadSummary};
pub use registry::{BackendFactory, BackendListing, ModelRegistry};
pub use scheduler::{TaskHandle, TaskScheduler, TaskState};
