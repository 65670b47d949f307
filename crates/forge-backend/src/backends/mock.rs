//! Scriptable mock backend for scheduler and governor tests
//!
//! Generates a tiny procedural mesh instantly. Failure injection,
//! latency, footprint, and determinism are configurable so engine
//! tests can script retry, admission, and caching scenarios.

use crate::backend::{check_input_supported, BackendInfo, BackendStatus, GenerateCtx, ModelBackend};
use crate::synth;
use forge_conform::RawMesh;
use forge_core::{BackendKind, ForgeError, GenerationRequest, InputPayload, Result};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

const MOCK_TARGET_TRIANGLES: u32 = 400;

pub struct MockBackend {
    footprint_mb: u64,
    latency: Duration,
    deterministic: bool,
    failing_unload: bool,
    /// Remaining generate calls that fail with a transient error
    transient_failures: AtomicU32,
    generate_calls: AtomicU32,
    loaded: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            footprint_mb: 100,
            latency: Duration::ZERO,
            deterministic: true,
            failing_unload: false,
            transient_failures: AtomicU32::new(0),
            generate_calls: AtomicU32::new(0),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn with_footprint(mut self, footprint_mb: u64) -> Self {
        self.footprint_mb = footprint_mb;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next `count` generate calls with a transient error
    pub fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn non_deterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }

    pub fn with_failing_unload(mut self) -> Self {
        self.failing_unload = true;
        self
    }

    /// Number of times `generate` was invoked, including failed attempts
    pub fn generate_calls(&self) -> u32 {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBackend for MockBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: "mock".to_string(),
            kind: BackendKind::Mock,
            supported_inputs: vec!["prompt", "image", "mesh"],
            footprint_mb: self.footprint_mb,
            approx_latency_secs: self.latency.as_secs_f64(),
            deterministic: self.deterministic,
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
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        ctx.check_cancelled()?;
        check_input_supported(&self.info(), request)?;

        if !self.latency.is_zero() {
            if ctx.remaining() < self.latency {
                return Err(ForgeError::BackendTransient(
                    "Generation attempt timed out".to_string(),
                ));
            }
            std::thread::sleep(self.latency);
            ctx.check_cancelled()?;
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ForgeError::BackendTransient(
                "Injected transient failure".to_string(),
            ));
        }

        let seed_text = match &request.input {
            InputPayload::Prompt(p) => p.clone(),
            InputPayload::Image(p) | InputPayload::Mesh(p) => p.to_string_lossy().to_string(),
        };
        let seed = synth::hash_seed(&seed_text, request.params.seed);
        Ok(synth::synthesize_blob(
            &request.name,
            seed,
            MOCK_TARGET_TRIANGLES,
            request.params.texture_size.min(64),
        ))
    }

    fn unload(&self) -> Result<()> {
        if self.failing_unload {
            return Err(ForgeError::BackendFatal(
                "Injected unload failure".to_string(),
            ));
        }
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt_request(name: &str, prompt: &str) -> GenerationRequest {
        GenerationRequest::new(name, BackendKind::Mock, InputPayload::Prompt(prompt.into()))
    }

    #[test]
    fn test_generates_small_mesh() {
        let backend = MockBackend::new();
        let mesh = backend
            .generate(&prompt_request("cube", "a cube"), &GenerateCtx::unbounded())
            .unwrap();
        assert!(mesh.triangle_count() >= MOCK_TARGET_TRIANGLES);
        assert_eq!(mesh.name, "cube");
        assert_eq!(backend.generate_calls(), 1);
    }

    #[test]
    fn test_deterministic_output() {
        let backend = MockBackend::new();
        let request = prompt_request("a", "same prompt");
        let first = backend.generate(&request, &GenerateCtx::unbounded()).unwrap();
        let second = backend.generate(&request, &GenerateCtx::unbounded()).unwrap();
        assert_eq!(first.positions, second.positions);
        assert_eq!(first.indices, second.indices);
    }

    #[test]
    fn test_transient_failures_then_success() {
        let backend = MockBackend::new().with_transient_failures(2);
        let request = prompt_request("a", "p");
        let ctx = GenerateCtx::unbounded();
        assert!(matches!(
            backend.generate(&request, &ctx),
            Err(ForgeError::BackendTransient(_))
        ));
        assert!(matches!(
            backend.generate(&request, &ctx),
            Err(ForgeError::BackendTransient(_))
        ));
        assert!(backend.generate(&request, &ctx).is_ok());
        assert_eq!(backend.generate_calls(), 3);
    }

    #[test]
    fn test_latency_exceeding_deadline_is_transient() {
        let backend = MockBackend::new().with_latency(Duration::from_secs(5));
        let ctx = GenerateCtx::new(
            std::sync::Arc::new(AtomicBool::new(false)),
            Duration::from_millis(10),
        );
        assert!(matches!(
            backend.generate(&prompt_request("a", "p"), &ctx),
            Err(ForgeError::BackendTransient(_))
        ));
    }

    #[test]
    fn test_load_unload_tracking() {
        let backend = MockBackend::new();
        assert!(!backend.is_loaded());
        backend.load().unwrap();
        assert!(backend.is_loaded());
        backend.unload().unwrap();
        assert!(!backend.is_loaded());
    }

    #[test]
    fn test_failing_unload() {
        let backend = MockBackend::new().with_failing_unload();
        backend.load().unwrap();
        assert!(backend.unload().is_err());
    }
}
