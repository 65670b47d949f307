//! The final asset bundle delivered to callers

use crate::pipeline::PlatformAsset;
use forge_core::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A platform the pipeline could not satisfy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformFailure {
    pub platform: String,
    pub detail: String,
}

/// The deliverable of a generation task: one conformant asset per
/// requested platform, plus explicit records of anything that failed.
/// The caller owns the bundle; the cache keeps its own copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBundle {
    /// Asset name from the originating request
    pub name: String,
    /// Backend that generated the raw mesh
    pub backend: String,
    /// Triangle count of the raw mesh before conformance
    pub raw_triangles: u32,
    pub raw_vertices: u32,
    /// Successful per-platform assets
    pub platforms: Vec<PlatformAsset>,
    /// Platforms that failed conformance
    #[serde(default)]
    pub failures: Vec<PlatformFailure>,
}

impl AssetBundle {
    /// True when every platform conformed and every format exported
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
            && self.platforms.iter().all(|p| p.all_exports_succeeded())
    }

    /// Rough in-memory size, used for cache accounting
    pub fn size_estimate_bytes(&self) -> usize {
        self.platforms
            .iter()
            .map(|p| p.size_estimate_bytes())
            .sum()
    }

    /// Write every exported file under `dir`, returning the paths
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut paths = Vec::new();
        for platform in &self.platforms {
            for record in &platform.exports {
                for file in &record.files {
                    let path = dir.join(&file.file_name);
                    std::fs::write(&path, &file.bytes)?;
                    paths.push(path);
                }
            }
        }
        Ok(paths)
    }
}
