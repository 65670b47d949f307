//! Local image-to-3D backend
//!
//! Synthesizes geometry from a reference image. The image's content
//! hash seeds the shape and its mean color drives the material, so
//! the same image always yields the same mesh.

use crate::backend::{check_input_supported, BackendInfo, BackendStatus, GenerateCtx, ModelBackend};
use crate::synth;
use forge_conform::{RawMesh, TextureMap};
use forge_core::{BackendKind, ForgeError, GenerationRequest, InputPayload, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct ImageTo3dBackend {
    loaded: AtomicBool,
}

impl ImageTo3dBackend {
    pub fn new() -> Self {
        Self {
            loaded: AtomicBool::new(false),
        }
    }

    fn load_reference(path: &Path) -> Result<image::RgbaImage> {
        if !path.exists() {
            return Err(ForgeError::InvalidRequest(format!(
                "Input image not found: {}",
                path.display()
            )));
        }
        let img = image::open(path).map_err(|e| {
            ForgeError::InvalidRequest(format!(
                "Cannot decode input image {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(img.to_rgba8())
    }
}

impl Default for ImageTo3dBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBackend for ImageTo3dBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: "image_to_3d".to_string(),
            kind: BackendKind::ImageTo3d,
            supported_inputs: vec!["image"],
            footprint_mb: 4200,
            approx_latency_secs: 45.0,
            deterministic: true,
        }
    }

    fn check_installed(&self) -> Result<BackendStatus> {
        Ok(BackendStatus::Available)
    }

    fn load(&self) -> Result<()> {
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn generate(&self, request: &GenerationRequest, ctx: &GenerateCtx) -> Result<RawMesh> {
        ctx.check_cancelled()?;
        ctx.check_deadline()?;
        check_input_supported(&self.info(), request)?;

        let path = match &request.input {
            InputPayload::Image(p) => p,
            _ => unreachable!("input support checked above"),
        };
        let reference = Self::load_reference(path)?;

        // Mean color of the reference drives the material
        let mut sums = [0u64; 3];
        for pixel in reference.pixels() {
            sums[0] += pixel[0] as u64;
            sums[1] += pixel[1] as u64;
            sums[2] += pixel[2] as u64;
        }
        let count = (reference.width() as u64 * reference.height() as u64).max(1);
        let mean = [
            (sums[0] / count) as u8,
            (sums[1] / count) as u8,
            (sums[2] / count) as u8,
            255,
        ];

        let seed = synth::hash_seed(
            &format!("{}:{}x{}", mean[0], reference.width(), reference.height()),
            request.params.seed,
        );
        let target = synth::target_triangles(&request.params);
        let mut mesh = synth::synthesize_blob(
            &request.name,
            seed,
            target,
            request.params.texture_size,
        );
        mesh.material.base_color = [
            mean[0] as f32 / 255.0,
            mean[1] as f32 / 255.0,
            mean[2] as f32 / 255.0,
            1.0,
        ];
        mesh.texture = Some(TextureMap::solid(
            request.params.texture_size,
            request.params.texture_size,
            mean,
        ));
        Ok(mesh)
    }

    fn unload(&self) -> Result<()> {
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }
}
