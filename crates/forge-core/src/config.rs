//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `FORGE_{BACKEND}_API_KEY`
//! 2. Project-local: `.forge/config.toml`
//! 3. Global: `~/.forge/config.toml`

use crate::error::{ForgeError, Result};
use crate::request::QualityMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Scheduler and resource budget settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base delay for exponential backoff between retries
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Maximum duration of a single generation attempt
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    /// GPU memory budget shared by all loaded backends
    #[serde(default = "default_gpu_memory_mb")]
    pub gpu_memory_limit_mb: u64,
    /// Task queue depth; submissions beyond it are rejected with
    /// `ResourceExhausted` rather than blocking the caller
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
}

fn default_max_concurrent() -> usize {
    2
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_task_timeout_secs() -> u64 {
    600
}
fn default_gpu_memory_mb() -> u64 {
    8192
}
fn default_max_queue_depth() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            task_timeout_secs: default_task_timeout_secs(),
            gpu_memory_limit_mb: default_gpu_memory_mb(),
            max_queue_depth: default_max_queue_depth(),
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_size_mb")]
    pub size_mb: u64,
}

fn default_true() -> bool {
    true
}
fn default_cache_size_mb() -> u64 {
    512
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            size_mb: default_cache_size_mb(),
        }
    }
}

/// Backend-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Declared constraints for one target platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformLimits {
    pub max_triangles: u32,
    /// Custom LOD reduction ratios; `None` disables LOD tiers,
    /// an empty list uses the built-in ladder
    #[serde(default)]
    pub lod_ratios: Option<Vec<f32>>,
    #[serde(default = "default_max_texture")]
    pub max_texture_size: u32,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
}

fn default_max_texture() -> u32 {
    2048
}
fn default_formats() -> Vec<String> {
    vec!["glb".to_string()]
}

/// Generation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default)]
    pub default_quality: QualityMode,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            default_quality: QualityMode::Balanced,
        }
    }
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForgeConfigFile {
    #[serde(default)]
    pub engine: Option<EngineConfig>,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
    #[serde(default)]
    pub platforms: HashMap<String, PlatformLimits>,
    #[serde(default)]
    pub generation: Option<GenerationDefaults>,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub backends: HashMap<String, BackendConfig>,
    pub platforms: HashMap<String, PlatformLimits>,
    pub generation: GenerationDefaults,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            cache: CacheConfig::default(),
            backends: HashMap::new(),
            platforms: HashMap::new(),
            generation: GenerationDefaults::default(),
        }
    }
}

impl ForgeConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut file = ForgeConfigFile::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut file, global);
            }
        }

        let local_path = PathBuf::from(".forge/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut file, local);
        }

        Self::apply_env_overrides(&mut file);
        Ok(Self::resolve(file))
    }

    /// Load config from a specific file path only (for testing)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut file = Self::load_file(path)?;
        Self::apply_env_overrides(&mut file);
        Ok(Self::resolve(file))
    }

    /// Get API key for a backend
    pub fn api_key(&self, backend_name: &str) -> Option<&str> {
        self.backends
            .get(backend_name)
            .and_then(|b| b.api_key.as_deref())
    }

    /// Get API URL for a backend
    pub fn api_url(&self, backend_name: &str) -> Option<&str> {
        self.backends
            .get(backend_name)
            .and_then(|b| b.api_url.as_deref())
    }

    /// Check if a backend is enabled
    pub fn is_enabled(&self, backend_name: &str) -> bool {
        self.backends
            .get(backend_name)
            .map(|b| b.enabled)
            .unwrap_or(true)
    }

    /// The configured platform table, or the built-in presets when no
    /// `[platforms]` section is present
    pub fn resolved_platforms(&self) -> HashMap<String, PlatformLimits> {
        if self.platforms.is_empty() {
            Self::builtin_platforms(self.generation.default_quality)
        } else {
            self.platforms.clone()
        }
    }

    /// Built-in platform presets with per-quality triangle limits
    pub fn builtin_platforms(quality: QualityMode) -> HashMap<String, PlatformLimits> {
        let presets: [(&str, [u32; 3], u32); 4] = [
            ("vrchat_pc", [20000, 50000, 70000], 2048),
            ("vrchat_quest", [5000, 10000, 20000], 1024),
            ("imvu", [10000, 20000, 35000], 1024),
            ("secondlife", [10000, 32000, 65000], 1024),
        ];
        let idx = match quality {
            QualityMode::Fast => 0,
            QualityMode::Balanced => 1,
            QualityMode::Quality => 2,
        };

        presets
            .iter()
            .map(|(name, limits, tex)| {
                (
                    name.to_string(),
                    PlatformLimits {
                        max_triangles: limits[idx],
                        lod_ratios: Some(Vec::new()),
                        max_texture_size: *tex,
                        formats: vec!["glb".to_string(), "obj".to_string()],
                    },
                )
            })
            .collect()
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".forge").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<ForgeConfigFile> {
        let content = std::fs::read_to_string(path)?;
        let file: ForgeConfigFile = toml::from_str(&content).map_err(|e| {
            ForgeError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        Ok(file)
    }

    fn merge_into(base: &mut ForgeConfigFile, overlay: ForgeConfigFile) {
        if overlay.engine.is_some() {
            base.engine = overlay.engine;
        }
        if overlay.cache.is_some() {
            base.cache = overlay.cache;
        }
        for (name, backend) in overlay.backends {
            let entry = base.backends.entry(name).or_default();
            if backend.api_key.is_some() {
                entry.api_key = backend.api_key;
            }
            if backend.api_url.is_some() {
                entry.api_url = backend.api_url;
            }
            entry.enabled = backend.enabled;
        }
        for (name, platform) in overlay.platforms {
            base.platforms.insert(name, platform);
        }
        if overlay.generation.is_some() {
            base.generation = overlay.generation;
        }
    }

    fn apply_env_overrides(file: &mut ForgeConfigFile) {
        let backend_names = ["remote"];
        for name in &backend_names {
            let env_key = format!("FORGE_{}_API_KEY", name.to_uppercase());
            if let Ok(key) = std::env::var(&env_key) {
                let entry = file.backends.entry(name.to_string()).or_default();
                entry.api_key = Some(key);
            }
        }
    }

    fn resolve(file: ForgeConfigFile) -> Self {
        Self {
            engine: file.engine.unwrap_or_default(),
            cache: file.cache.unwrap_or_default(),
            backends: file.backends,
            platforms: file.platforms,
            generation: file.generation.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_config(content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("forge_config_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_config_from_file() {
        std::env::remove_var("FORGE_REMOTE_API_KEY");

        let config_str = r#"
[engine]
max_concurrent_tasks = 4
gpu_memory_limit_mb = 16384

[cache]
enabled = false

[backends.remote]
api_key = "test-key-123"
api_url = "https://api.example.com/text-to-3d"

[platforms.vrchat_quest]
max_triangles = 10000
max_texture_size = 1024
formats = ["glb"]
"#;
        let path = temp_config(config_str);
        let config = ForgeConfig::load_from_file(&path).unwrap();

        assert_eq!(config.engine.max_concurrent_tasks, 4);
        assert_eq!(config.engine.gpu_memory_limit_mb, 16384);
        assert!(!config.cache.enabled);
        assert_eq!(config.api_key("remote"), Some("test-key-123"));
        assert_eq!(
            config.resolved_platforms().get("vrchat_quest").unwrap().max_triangles,
            10000
        );

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let path = temp_config("");
        let config = ForgeConfig::load_from_file(&path).unwrap();

        assert_eq!(config.engine.max_concurrent_tasks, 2);
        assert_eq!(config.engine.retry_attempts, 3);
        assert_eq!(config.engine.retry_delay_ms, 500);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.size_mb, 512);

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_env_var_override() {
        let config_str = r#"
[backends.remote]
api_key = "file-key"
"#;
        let path = temp_config(config_str);

        std::env::set_var("FORGE_REMOTE_API_KEY", "env-key-override");
        let config = ForgeConfig::load_from_file(&path).unwrap();
        assert_eq!(config.api_key("remote"), Some("env-key-override"));
        std::env::remove_var("FORGE_REMOTE_API_KEY");

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_builtin_platform_presets() {
        let config = ForgeConfig::default();
        let platforms = config.resolved_platforms();
        assert_eq!(platforms.len(), 4);
        // Balanced quality limits from the platform tables
        assert_eq!(platforms["vrchat_pc"].max_triangles, 50000);
        assert_eq!(platforms["vrchat_quest"].max_triangles, 10000);
        assert_eq!(platforms["imvu"].max_triangles, 20000);
        assert_eq!(platforms["secondlife"].max_triangles, 32000);

        let fast = ForgeConfig::builtin_platforms(QualityMode::Fast);
        assert_eq!(fast["vrchat_quest"].max_triangles, 5000);
    }

    #[test]
    fn test_missing_backend_defaults() {
        let config = ForgeConfig::default();
        assert_eq!(config.api_key("remote"), None);
        assert!(config.is_enabled("remote"));
    }
}
