//! Backend factory
//!
//! Maps backend kinds to concrete implementations. The model registry
//! calls this lazily so a backend is only constructed when first
//! requested.

pub mod image_to_3d;
pub mod mesh_refiner;
pub mod mock;
pub mod remote;
pub mod text_to_3d;

use crate::backend::ModelBackend;
use forge_core::{BackendKind, ForgeConfig, Result};
use std::sync::Arc;

/// Construct a backend by kind with configuration
pub fn create_backend(kind: BackendKind, config: &ForgeConfig) -> Result<Arc<dyn ModelBackend>> {
    match kind {
        BackendKind::TextTo3d => Ok(Arc::new(text_to_3d::TextTo3dBackend::new())),
        BackendKind::ImageTo3d => Ok(Arc::new(image_to_3d::ImageTo3dBackend::new())),
        BackendKind::MeshRefiner => Ok(Arc::new(mesh_refiner::MeshRefinerBackend::new())),
        BackendKind::Remote => Ok(Arc::new(remote::RemoteBackend::from_config(config)?)),
        BackendKind::Mock => Ok(Arc::new(mock::MockBackend::new())),
    }
}

/// All statically known backend kinds
pub fn available_backends() -> &'static [BackendKind] {
    BackendKind::all()
}
