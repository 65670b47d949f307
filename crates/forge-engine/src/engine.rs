//! The engine facade
//!
//! Wires the registry, governor, scheduler, and cache together behind
//! one handle. Constructing a `ForgeEngine` spawns the worker pool;
//! dropping it drains the queue and joins the workers.

use crate::cache::{CacheStats, ResultCache};
use crate::governor::{GpuGovernor, LoadedModelInfo};
use crate::registry::{BackendFactory, BackendListing, ModelRegistry};
use crate::scheduler::{TaskHandle, TaskScheduler};
use forge_backend::BackendInfo;
use forge_conform::AssetBundle;
use forge_core::{BackendKind, ForgeConfig, GenerationRequest, Result};
use std::sync::Arc;

pub struct ForgeEngine {
    registry: Arc<ModelRegistry>,
    governor: Arc<GpuGovernor>,
    cache: Arc<ResultCache>,
    scheduler: TaskScheduler,
}

impl ForgeEngine {
    pub fn new(config: ForgeConfig) -> Self {
        Self::build(config, None)
    }

    /// Engine with a custom backend factory (used by tests)
    pub fn with_factory(config: ForgeConfig, factory: BackendFactory) -> Self {
        Self::build(config, Some(factory))
    }

    fn build(config: ForgeConfig, factory: Option<BackendFactory>) -> Self {
        let registry = Arc::new(match factory {
            Some(factory) => ModelRegistry::with_factory(config.clone(), factory),
            None => ModelRegistry::new(config.clone()),
        });
        let governor = Arc::new(GpuGovernor::new(config.engine.gpu_memory_limit_mb));
        let cache = Arc::new(ResultCache::new(&config.cache));
        let scheduler = TaskScheduler::new(
            config,
            Arc::clone(&registry),
            Arc::clone(&governor),
            Arc::clone(&cache),
        );
        Self {
            registry,
            governor,
            cache,
            scheduler,
        }
    }

    /// Enqueue a generation task and return a handle to it
    pub fn submit(&self, request: GenerationRequest) -> Result<TaskHandle> {
        self.scheduler.submit(request)
    }

    /// Submit and block until the bundle is ready
    pub fn generate(&self, request: GenerationRequest) -> Result<Arc<AssetBundle>> {
        self.submit(request)?.wait()
    }

    /// Every known backend with its capability info and availability
    pub fn list_available_models(&self) -> Vec<BackendListing> {
        self.registry.list()
    }

    /// Capability descriptor for one backend
    pub fn model_info(&self, kind: BackendKind) -> Result<BackendInfo> {
        self.registry.info(kind)
    }

    /// Drop every cached bundle, returning how many were removed
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Pin a cached bundle against budget eviction
    pub fn pin_cached(&self, handle: &TaskHandle) -> bool {
        self.cache.pin(&handle.fingerprint())
    }

    pub fn unpin_cached(&self, handle: &TaskHandle) -> bool {
        self.cache.unpin(&handle.fingerprint())
    }

    /// Unload every idle backend, returning how many were unloaded.
    /// A backend whose unload fails is dropped from the registry so
    /// the next request constructs a fresh instance.
    pub fn unload_all_models(&self) -> usize {
        let summary = self.governor.unload_idle();
        for kind in &summary.failed {
            self.registry.forget(*kind);
        }
        summary.unloaded
    }

    /// Currently loaded backends and their footprints
    pub fn loaded_models(&self) -> Vec<LoadedModelInfo> {
        self.governor.loaded_models()
    }

    pub fn gpu_used_mb(&self) -> u64 {
        self.governor.used_mb()
    }

    pub fn gpu_budget_mb(&self) -> u64 {
        self.governor.budget_mb()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_backend::backends::mock::MockBackend;
    use forge_backend::ModelBackend;
    use forge_core::InputPayload;

    fn engine_with_mock(mock: Arc<MockBackend>) -> ForgeEngine {
        let mut config = ForgeConfig::default();
        config.engine.retry_delay_ms = 1;
        ForgeEngine::with_factory(
            config,
            Box::new(move |_, _| Ok(Arc::clone(&mock) as Arc<dyn ModelBackend>)),
        )
    }

    fn request(prompt: &str, platforms: &[&str]) -> GenerationRequest {
        let mut r = GenerationRequest::new(
            "asset",
            BackendKind::Mock,
            InputPayload::Prompt(prompt.to_string()),
        );
        r.platforms = platforms.iter().map(|p| p.to_string()).collect();
        r
    }

    #[test]
    fn test_generate_multi_platform() {
        let engine = engine_with_mock(Arc::new(MockBackend::new()));
        let bundle = engine
            .generate(request("a crate", &["vrchat_quest", "imvu"]))
            .unwrap();
        assert_eq!(bundle.platforms.len(), 2);
        assert!(bundle.is_complete());
        for platform in &bundle.platforms {
            // Balanced-quality ceilings from the built-in presets
            let ceiling = match platform.platform.as_str() {
                "vrchat_quest" => 10000,
                "imvu" => 20000,
                other => panic!("unexpected platform {}", other),
            };
            assert!(platform.base.triangle_count() <= ceiling);
        }
    }

    #[test]
    fn test_model_lifecycle() {
        let mock = Arc::new(MockBackend::new());
        let engine = engine_with_mock(Arc::clone(&mock));

        engine.generate(request("a", &["imvu"])).unwrap();
        assert!(mock.is_loaded());
        assert_eq!(engine.gpu_used_mb(), 100);

        assert_eq!(engine.unload_all_models(), 1);
        assert!(!mock.is_loaded());
        assert_eq!(engine.gpu_used_mb(), 0);
    }

    #[test]
    fn test_cache_roundtrip_and_clear() {
        let mock = Arc::new(MockBackend::new());
        let engine = engine_with_mock(Arc::clone(&mock));

        engine.generate(request("a", &["imvu"])).unwrap();
        assert_eq!(engine.cache_stats().entries, 1);
        engine.generate(request("a", &["imvu"])).unwrap();
        assert_eq!(mock.generate_calls(), 1);

        assert_eq!(engine.clear_cache(), 1);
        engine.generate(request("a", &["imvu"])).unwrap();
        assert_eq!(mock.generate_calls(), 2);
    }

    #[test]
    fn test_failed_unload_forgets_instance() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let constructions = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&constructions);
        let mut config = ForgeConfig::default();
        config.cache.enabled = false;
        let engine = ForgeEngine::with_factory(
            config,
            Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(MockBackend::new().with_failing_unload()) as Arc<dyn ModelBackend>)
            }),
        );

        engine.generate(request("a", &["imvu"])).unwrap();
        assert_eq!(constructions.load(Ordering::SeqCst), 1);

        // Unload fails but still counts; the instance is dropped
        assert_eq!(engine.unload_all_models(), 1);
        assert_eq!(engine.gpu_used_mb(), 0);

        engine.generate(request("a", &["imvu"])).unwrap();
        assert_eq!(constructions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_eviction_unload_forgets_instance() {
        use forge_backend::backends::text_to_3d::TextTo3dBackend;
        use std::sync::atomic::{AtomicU32, Ordering};

        let mock_constructions = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&mock_constructions);
        let mut config = ForgeConfig::default();
        config.engine.gpu_memory_limit_mb = 4000;
        let engine = ForgeEngine::with_factory(
            config,
            Box::new(move |kind, _| match kind {
                BackendKind::Mock => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(
                        MockBackend::new().with_footprint(3500).with_failing_unload(),
                    ) as Arc<dyn ModelBackend>)
                }
                _ => Ok(Arc::new(TextTo3dBackend::new()) as Arc<dyn ModelBackend>),
            }),
        );

        engine.generate(request("a", &["imvu"])).unwrap();
        assert_eq!(mock_constructions.load(Ordering::SeqCst), 1);

        // text_to_3d (3500 MB) evicts the idle mock; its unload fails
        let mut r = GenerationRequest::new(
            "lamp",
            BackendKind::TextTo3d,
            InputPayload::Prompt("a lamp".to_string()),
        );
        r.platforms = vec!["imvu".to_string()];
        engine.generate(r).unwrap();

        // The broken instance was dropped, so the next request
        // constructs a fresh one
        engine.generate(request("b", &["imvu"])).unwrap();
        assert_eq!(mock_constructions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_model_info() {
        let engine = engine_with_mock(Arc::new(MockBackend::new()));
        let info = engine.model_info(BackendKind::Mock).unwrap();
        assert_eq!(info.name, "mock");
        assert!(info.deterministic);
    }

    #[test]
    fn test_list_available_models() {
        let engine = engine_with_mock(Arc::new(MockBackend::new()));
        let listings = engine.list_available_models();
        assert_eq!(listings.len(), BackendKind::all().len());
    }
}
