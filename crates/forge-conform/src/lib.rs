//! Forge Conform - Platform conformance pipeline
//!
//! Takes raw generated meshes and makes them satisfy a target
//! platform's hard constraints: triangle ceiling, LOD tiers, texture
//! resolution, and export formats. The pipeline never emits a mesh
//! above a platform's declared ceiling; when simplification cannot
//! reach it within the iteration budget it fails explicitly.

pub mod bundle;
pub mod export;
pub mod import;
pub mod lod;
pub mod mesh;
pub mod pipeline;
pub mod profile;
pub mod simplify;
pub mod texture;

pub use bundle::{AssetBundle, PlatformFailure};
pub use export::{encode_mesh, ExportFormat};
pub use import::{import_glb, import_glb_slice};
pub use lod::{generate_lod_tiers, LodTier, DEFAULT_LOD_RATIOS};
pub use mesh::{Material, MeshBounds, RawMesh, TextureMap};
pub use pipeline::{conform, ExportRecord, PlatformAsset};
pub use profile::PlatformProfile;
pub use simplify::simplify_to_target;
pub use texture::clamp_texture;
