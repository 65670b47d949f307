//! Model registry
//!
//! Holds exactly one instance per backend kind, constructed lazily on
//! first request through an injectable factory. Disabled backends are
//! reported as unknown so callers cannot route work to them.

use forge_backend::{BackendInfo, BackendStatus, ModelBackend};
use forge_core::{BackendKind, ForgeConfig, ForgeError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub type BackendFactory =
    Box<dyn Fn(BackendKind, &ForgeConfig) -> Result<Arc<dyn ModelBackend>> + Send + Sync>;

/// One row of `list`: a kind plus its capability info and availability
#[derive(Debug, Clone)]
pub struct BackendListing {
    pub kind: BackendKind,
    /// Capability descriptor; `None` when the backend could not be
    /// constructed (e.g. missing API key)
    pub info: Option<BackendInfo>,
    pub status: BackendStatus,
}

pub struct ModelRegistry {
    config: ForgeConfig,
    factory: BackendFactory,
    backends: Mutex<HashMap<BackendKind, Arc<dyn ModelBackend>>>,
}

impl ModelRegistry {
    pub fn new(config: ForgeConfig) -> Self {
        Self::with_factory(config, Box::new(forge_backend::create_backend))
    }

    /// Registry with a custom backend factory (used by tests to
    /// inject scripted backends)
    pub fn with_factory(config: ForgeConfig, factory: BackendFactory) -> Self {
        Self {
            config,
            factory,
            backends: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BackendKind, Arc<dyn ModelBackend>>> {
        self.backends.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Get the single instance for `kind`, constructing it on first
    /// use. The map lock is held across construction so concurrent
    /// callers always observe one instance.
    pub fn get(&self, kind: BackendKind) -> Result<Arc<dyn ModelBackend>> {
        if !self.config.is_enabled(&kind.to_string()) {
            return Err(ForgeError::UnknownBackend(format!(
                "'{}' is disabled in config",
                kind
            )));
        }

        let mut backends = self.lock();
        if let Some(backend) = backends.get(&kind) {
            return Ok(Arc::clone(backend));
        }
        let backend = (self.factory)(kind, &self.config)?;
        backends.insert(kind, Arc::clone(&backend));
        Ok(backend)
    }

    /// Drop the tracked instance for `kind`. Called after a failed
    /// unload so the next `get` constructs a fresh backend instead of
    /// reusing one in an unknown state.
    pub fn forget(&self, kind: BackendKind) {
        self.lock().remove(&kind);
    }

    /// Capability info for one backend
    pub fn info(&self, kind: BackendKind) -> Result<BackendInfo> {
        Ok(self.get(kind)?.info())
    }

    /// List every known backend kind with its availability
    pub fn list(&self) -> Vec<BackendListing> {
        BackendKind::all()
            .iter()
            .map(|&kind| {
                if !self.config.is_enabled(&kind.to_string()) {
                    return BackendListing {
                        kind,
                        info: None,
                        status: BackendStatus::Unavailable("disabled in config".to_string()),
                    };
                }
                match self.get(kind) {
                    Ok(backend) => {
                        let status = backend
                            .check_installed()
                            .unwrap_or_else(|e| BackendStatus::Unavailable(e.to_string()));
                        BackendListing {
                            kind,
                            info: Some(backend.info()),
                            status,
                        }
                    }
                    Err(e) => BackendListing {
                        kind,
                        info: None,
                        status: BackendStatus::Unavailable(e.to_string()),
                    },
                }
            })
            .collect()
    }
}
