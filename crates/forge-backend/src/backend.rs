//! Backend capability trait and shared types

use forge_conform::RawMesh;
use forge_core::{BackendKind, ForgeError, GenerationRequest, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Capability descriptor for a backend
#[derive(Debug, Clone, Serialize)]
pub struct BackendInfo {
    pub name: String,
    pub kind: BackendKind,
    /// Input tags the backend accepts (`prompt`, `image`, `mesh`)
    pub supported_inputs: Vec<&'static str>,
    /// Declared GPU memory footprint when loaded
    pub footprint_mb: u64,
    /// Rough generation latency used for scheduling hints
    pub approx_latency_secs: f64,
    /// Whether identical requests produce identical output.
    /// Non-deterministic backends are excluded from result caching.
    pub deterministic: bool,
}

impl BackendInfo {
    pub fn supports(&self, input_tag: &str) -> bool {
        self.supported_inputs.contains(&input_tag)
    }
}

/// Status returned by a backend availability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Available,
    Unavailable(String),
    NoApiKey,
}

/// Per-attempt execution context: cooperative cancellation flag and
/// the attempt deadline. Backends check both at convenient boundaries;
/// neither is preemptive.
#[derive(Clone)]
pub struct GenerateCtx {
    cancelled: Arc<AtomicBool>,
    deadline: Instant,
}

impl GenerateCtx {
    pub fn new(cancelled: Arc<AtomicBool>, timeout: Duration) -> Self {
        Self {
            cancelled,
            deadline: Instant::now() + timeout,
        }
    }

    /// Context that never times out or cancels (single-shot callers)
    pub fn unbounded() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)), Duration::from_secs(u32::MAX as u64))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Error out when the caller cancelled the task
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ForgeError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Error out when the attempt deadline has passed.
    /// Timeouts are transient: the scheduler retries them.
    pub fn check_deadline(&self) -> Result<()> {
        if self.remaining().is_zero() {
            Err(ForgeError::BackendTransient(
                "Generation attempt timed out".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Contract implemented by every generative model backend.
///
/// Backends are opaque capability providers: the engine only queries
/// capabilities, manages load state through the resource governor,
/// and invokes `generate`. Exactly one instance per kind lives in the
/// model registry.
pub trait ModelBackend: Send + Sync {
    /// Capability descriptor (also carries the declared footprint)
    fn info(&self) -> BackendInfo;

    /// Check whether the backend can run at all (weights present,
    /// API key configured, service reachable)
    fn check_installed(&self) -> Result<BackendStatus>;

    /// Allocate the backend's resources. Called only by the resource
    /// governor after admission; never directly by callers.
    fn load(&self) -> Result<()>;

    /// Run one generation attempt
    fn generate(&self, request: &GenerationRequest, ctx: &GenerateCtx) -> Result<RawMesh>;

    /// Release the backend's resources. Best-effort; failures are
    /// logged by the registry, not propagated.
    fn unload(&self) -> Result<()>;

    fn kind(&self) -> BackendKind {
        self.info().kind
    }
}

/// Reject a request whose input the backend cannot consume
pub fn check_input_supported(info: &BackendInfo, request: &GenerationRequest) -> Result<()> {
    let tag = request.input.kind_tag();
    if info.supports(tag) {
        Ok(())
    } else {
        Err(ForgeError::InvalidRequest(format!(
            "Backend '{}' does not accept '{}' input (accepts: {})",
            info.name,
            tag,
            info.supported_inputs.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctx_cancel() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = GenerateCtx::new(flag.clone(), Duration::from_secs(60));
        assert!(ctx.check_cancelled().is_ok());
        flag.store(true, Ordering::Relaxed);
        assert!(matches!(ctx.check_cancelled(), Err(ForgeError::Cancelled)));
    }

    #[test]
    fn test_ctx_deadline_is_transient() {
        let ctx = GenerateCtx::new(Arc::new(AtomicBool::new(false)), Duration::ZERO);
        match ctx.check_deadline() {
            Err(ForgeError::BackendTransient(_)) => {}
            other => panic!("expected transient timeout, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_input_support_check() {
        let info = BackendInfo {
            name: "t23d".to_string(),
            kind: BackendKind::TextTo3d,
            supported_inputs: vec!["prompt"],
            footprint_mb: 1000,
            approx_latency_secs: 10.0,
            deterministic: true,
        };
        let ok = GenerationRequest::new(
            "a",
            BackendKind::TextTo3d,
            forge_core::InputPayload::Prompt("chair".to_string()),
        );
        assert!(check_input_supported(&info, &ok).is_ok());

        let bad = GenerationRequest::new(
            "a",
            BackendKind::TextTo3d,
            forge_core::InputPayload::Image("chair.png".into()),
        );
        assert!(matches!(
            check_input_supported(&info, &bad),
            Err(ForgeError::InvalidRequest(_))
        ));
    }
}
