//! Forge Core - Shared types for the MeshForge generation engine
//!
//! Provides the error taxonomy, request/parameter types, deduplication
//! fingerprints, and the layered configuration loader used by every
//! other crate in the workspace.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod request;

pub use config::{BackendConfig, CacheConfig, EngineConfig, ForgeConfig, PlatformLimits};
pub use error::{ForgeError, Result};
pub use fingerprint::Fingerprint;
pub use request::{BackendKind, GenerationParams, GenerationRequest, InputPayload, QualityMode};
