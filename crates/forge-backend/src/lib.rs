//! Forge Backend - Pluggable generative model backends
//!
//! Defines the capability contract every backend satisfies (capability
//! query, availability check, load/unload, generate) and the concrete
//! implementations: local text-to-3D and image-to-3D synthesizers, a
//! mesh refiner, a remote API-backed generator, and a scriptable mock
//! for tests.

pub mod backend;
pub mod backends;
pub mod synth;

pub use backend::{BackendInfo, BackendStatus, GenerateCtx, ModelBackend};
pub use backends::{available_backends, create_backend};
