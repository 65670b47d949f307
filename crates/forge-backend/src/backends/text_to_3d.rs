//! Local text-to-3D backend
//!
//! Synthesizes geometry from a text prompt. The shape is fully
//! determined by the prompt and seed, so the backend declares itself
//! deterministic and its results are cacheable.

use crate::backend::{check_input_supported, BackendInfo, BackendStatus, GenerateCtx, ModelBackend};
use crate::synth;
use forge_conform::RawMesh;
use forge_core::{BackendKind, ForgeError, GenerationRequest, InputPayload, Result};
use std::sync::atomic::{AtomicBool, Ordering};

pub struct TextTo3dBackend {
    loaded: AtomicBool,
}

impl TextTo3dBackend {
    pub fn new() -> Self {
        Self {
            loaded: AtomicBool::new(false),
        }
    }
}

impl Default for TextTo3dBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBackend for TextTo3dBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: "text_to_3d".to_string(),
            kind: BackendKind::TextTo3d,
            supported_inputs: vec!["prompt"],
            footprint_mb: 3500,
            approx_latency_secs: 30.0,
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

        let prompt = match &request.input {
            InputPayload::Prompt(p) if !p.trim().is_empty() => p,
            InputPayload::Prompt(_) => {
                return Err(ForgeError::InvalidRequest("Empty prompt".to_string()))
            }
            _ => unreachable!("input support checked above"),
        };

        let seed = synth::hash_seed(prompt, request.params.seed);
        let target = synth::target_triangles(&request.params);
        Ok(synth::synthesize_blob(
            &request.name,
            seed,
            target,
            request.params.texture_size,
        ))
    }

    fn unload(&self) -> Result<()> {
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }
}
