//! GPU resource governor
//!
//! Tracks a single GPU memory budget shared by every loaded backend.
//! Admission either grants the declared footprint (loading the
//! backend if needed), evicts least-recently-used idle backends to
//! make room, or denies with `ResourceExhausted`. A denied admission
//! is not retried by the scheduler; the caller's task fails.

use forge_backend::ModelBackend;
use forge_core::{BackendKind, ForgeError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

struct LoadedModel {
    backend: Arc<dyn ModelBackend>,
    footprint_mb: u64,
    /// Generation attempts currently running on this backend.
    /// A busy backend is never evicted.
    active: u32,
    last_used: Instant,
}

struct GovernorInner {
    budget_mb: u64,
    loaded: HashMap<BackendKind, LoadedModel>,
}

impl GovernorInner {
    fn used_mb(&self) -> u64 {
        self.loaded.values().map(|m| m.footprint_mb).sum()
    }

    /// Evict the least-recently-used idle backend, if any. Returns the
    /// evicted kind and whether its unload failed.
    fn evict_one_idle(&mut self) -> Option<(BackendKind, bool)> {
        let victim = self
            .loaded
            .iter()
            .filter(|(_, m)| m.active == 0)
            .min_by_key(|(_, m)| m.last_used)
            .map(|(kind, _)| *kind)?;

        let mut failed = false;
        if let Some(model) = self.loaded.remove(&victim) {
            if let Err(e) = model.backend.unload() {
                eprintln!("Warning: failed to unload {}: {}", victim, e);
                failed = true;
            }
        }
        Some((victim, failed))
    }
}

/// Resource snapshot for one loaded backend
#[derive(Debug, Clone)]
pub struct LoadedModelInfo {
    pub kind: BackendKind,
    pub footprint_mb: u64,
    pub busy: bool,
}

/// Outcome of an `unload_idle` sweep
#[derive(Debug, Default)]
pub struct UnloadSummary {
    /// Backends removed from the budget (including failed unloads)
    pub unloaded: usize,
    /// Backends whose `unload` returned an error
    pub failed: Vec<BackendKind>,
}

pub struct GpuGovernor {
    inner: Mutex<GovernorInner>,
}

impl GpuGovernor {
    pub fn new(budget_mb: u64) -> Self {
        Self {
            inner: Mutex::new(GovernorInner {
                budget_mb,
                loaded: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GovernorInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Admit one generation attempt on `backend`, loading it if it is
    /// not resident. Evicts idle backends in LRU order when the budget
    /// does not cover the declared footprint. The lock is held across
    /// `load`, so loads serialize; the actual generation does not run
    /// under this lock.
    ///
    /// Returns the kinds whose unload failed during eviction; the
    /// caller should drop those instances rather than reuse them.
    pub fn admit(&self, backend: &Arc<dyn ModelBackend>) -> Result<Vec<BackendKind>> {
        let info = backend.info();
        let mut inner = self.lock();

        if let Some(model) = inner.loaded.get_mut(&info.kind) {
            model.active += 1;
            model.last_used = Instant::now();
            return Ok(Vec::new());
        }

        if info.footprint_mb > inner.budget_mb {
            return Err(ForgeError::ResourceExhausted(format!(
                "Backend '{}' needs {} MB but the GPU budget is {} MB",
                info.name, info.footprint_mb, inner.budget_mb
            )));
        }

        let mut failed_unloads = Vec::new();
        while inner.budget_mb - inner.used_mb() < info.footprint_mb {
            match inner.evict_one_idle() {
                Some((kind, failed)) => {
                    if failed {
                        failed_unloads.push(kind);
                    }
                }
                None => {
                    return Err(ForgeError::ResourceExhausted(format!(
                        "Backend '{}' needs {} MB but only {} MB are free and every loaded backend is busy",
                        info.name,
                        info.footprint_mb,
                        inner.budget_mb - inner.used_mb()
                    )));
                }
            }
        }

        backend.load()?;
        inner.loaded.insert(
            info.kind,
            LoadedModel {
                backend: Arc::clone(backend),
                footprint_mb: info.footprint_mb,
                active: 1,
                last_used: Instant::now(),
            },
        );
        Ok(failed_unloads)
    }

    /// Release one admitted attempt. The backend stays resident as an
    /// eviction candidate.
    pub fn release(&self, kind: BackendKind) {
        let mut inner = self.lock();
        if let Some(model) = inner.loaded.get_mut(&kind) {
            model.active = model.active.saturating_sub(1);
            model.last_used = Instant::now();
        }
    }

    /// Unload every idle backend. Busy backends are skipped with a
    /// warning. A failed unload still frees its budget slot; the
    /// failure is reported so the caller can drop the instance.
    pub fn unload_idle(&self) -> UnloadSummary {
        let mut inner = self.lock();
        let mut idle = Vec::new();
        for (kind, model) in inner.loaded.iter() {
            if model.active == 0 {
                idle.push(*kind);
            } else {
                eprintln!("Warning: backend {} is busy, not unloading", kind);
            }
        }
        let mut summary = UnloadSummary::default();
        for kind in &idle {
            if let Some(model) = inner.loaded.remove(kind) {
                summary.unloaded += 1;
                if let Err(e) = model.backend.unload() {
                    eprintln!("Warning: failed to unload {}: {}", kind, e);
                    summary.failed.push(*kind);
                }
            }
        }
        summary
    }

    pub fn used_mb(&self) -> u64 {
        self.lock().used_mb()
    }

    pub fn budget_mb(&self) -> u64 {
        self.lock().budget_mb
    }

    /// Snapshot of the currently loaded backends
    pub fn loaded_models(&self) -> Vec<LoadedModelInfo> {
        self.lock()
            .loaded
            .iter()
            .map(|(kind, m)| LoadedModelInfo {
                kind: *kind,
                footprint_mb: m.footprint_mb,
                busy: m.active > 0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_backend::backends::mock::MockBackend;

    fn mock(footprint_mb: u64) -> Arc<dyn ModelBackend> {
        Arc::new(MockBackend::new().with_footprint(footprint_mb))
    }

    #[test]
    fn test_admit_within_budget() {
        let governor = GpuGovernor::new(1000);
        let backend = mock(400);
        governor.admit(&backend).unwrap();
        assert_eq!(governor.used_mb(), 400);
        governor.release(BackendKind::Mock);
        assert_eq!(governor.used_mb(), 400);
    }

    #[test]
    fn test_footprint_over_budget_denied() {
        let governor = GpuGovernor::new(1000);
        let backend = mock(2000);
        assert!(matches!(
            governor.admit(&backend),
            Err(ForgeError::ResourceExhausted(_))
        ));
        assert_eq!(governor.used_mb(), 0);
    }

    #[test]
    fn test_admit_already_loaded_is_free() {
        let governor = GpuGovernor::new(1000);
        let backend = mock(800);
        governor.admit(&backend).unwrap();
        governor.release(BackendKind::Mock);
        governor.admit(&backend).unwrap();
        assert_eq!(governor.used_mb(), 800);
    }

    #[test]
    fn test_busy_backend_not_evicted() {
        let governor = GpuGovernor::new(1000);
        // Both backends share a kind in this mock-only test, so use
        // the real distinction: one busy mock fills the budget and a
        // second admission of a different instance must fail
        let busy: Arc<dyn ModelBackend> = Arc::new(MockBackend::new().with_footprint(800));
        governor.admit(&busy).unwrap();
        // Still active (no release); nothing can be evicted and a new
        // load of the same kind reuses the resident entry instead
        governor.admit(&busy).unwrap();
        assert_eq!(governor.used_mb(), 800);
    }

    #[test]
    fn test_lru_eviction_makes_room() {
        use forge_backend::backends::{image_to_3d::ImageTo3dBackend, text_to_3d::TextTo3dBackend};

        let governor = GpuGovernor::new(8000);
        let text: Arc<dyn ModelBackend> = Arc::new(TextTo3dBackend::new());
        let image: Arc<dyn ModelBackend> = Arc::new(ImageTo3dBackend::new());

        // text (3500) then image (4200), both left idle
        governor.admit(&text).unwrap();
        governor.release(BackendKind::TextTo3d);
        governor.admit(&image).unwrap();
        governor.release(BackendKind::ImageTo3d);
        assert_eq!(governor.used_mb(), 7700);

        // A 4000 MB admission evicts both idle backends, oldest first
        let big = mock(4000);
        governor.admit(&big).unwrap();
        assert_eq!(governor.used_mb(), 4000);
        let loaded = governor.loaded_models();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].kind, BackendKind::Mock);
    }

    #[test]
    fn test_eviction_reports_failed_unload() {
        use forge_backend::backends::text_to_3d::TextTo3dBackend;

        let governor = GpuGovernor::new(4000);
        let flaky: Arc<dyn ModelBackend> =
            Arc::new(MockBackend::new().with_footprint(3500).with_failing_unload());
        assert!(governor.admit(&flaky).unwrap().is_empty());
        governor.release(BackendKind::Mock);

        // Admitting text_to_3d (3500 MB) must evict the idle mock,
        // whose unload fails
        let text: Arc<dyn ModelBackend> = Arc::new(TextTo3dBackend::new());
        let failed = governor.admit(&text).unwrap();
        assert_eq!(failed, vec![BackendKind::Mock]);
        assert_eq!(governor.used_mb(), 3500);
    }

    #[test]
    fn test_unload_idle() {
        let governor = GpuGovernor::new(1000);
        let backend = mock(400);
        governor.admit(&backend).unwrap();
        // Busy: not unloaded
        assert_eq!(governor.unload_idle().unloaded, 0);
        governor.release(BackendKind::Mock);
        assert_eq!(governor.unload_idle().unloaded, 1);
        assert_eq!(governor.used_mb(), 0);
    }

    #[test]
    fn test_failed_unload_still_frees_budget() {
        let governor = GpuGovernor::new(1000);
        let backend: Arc<dyn ModelBackend> =
            Arc::new(MockBackend::new().with_footprint(400).with_failing_unload());
        governor.admit(&backend).unwrap();
        governor.release(BackendKind::Mock);
        let summary = governor.unload_idle();
        assert_eq!(summary.unloaded, 1);
        assert_eq!(summary.failed, vec![BackendKind::Mock]);
        assert_eq!(governor.used_mb(), 0);
    }
}
