//! Platform constraint profiles

use crate::export::ExportFormat;
use crate::lod::DEFAULT_LOD_RATIOS;
use forge_core::{ForgeError, PlatformLimits, Result};
use serde::{Deserialize, Serialize};

/// Resolved constraint set for one target platform. Read-only once
/// built from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformProfile {
    pub name: String,
    /// Hard triangle ceiling; the pipeline never emits above this
    pub max_triangles: u32,
    /// Reduction ratios for LOD tiers below the base mesh; empty
    /// disables LOD generation
    pub lod_ratios: Vec<f32>,
    /// Texture resolution ceiling (longest edge, pixels)
    pub max_texture_size: u32,
    /// Export formats the bundle must contain
    pub formats: Vec<ExportFormat>,
}

impl PlatformProfile {
    /// Build a profile from a configured limits entry.
    ///
    /// `lod_ratios = None` disables tiers; an empty list selects the
    /// built-in ladder.
    pub fn from_limits(name: &str, limits: &PlatformLimits) -> Result<Self> {
        let mut formats = Vec::new();
        for f in &limits.formats {
            let format: ExportFormat = f.parse()?;
            if !formats.contains(&format) {
                formats.push(format);
            }
        }
        if formats.is_empty() {
            return Err(ForgeError::ConfigError(format!(
                "Platform '{}' declares no export formats",
                name
            )));
        }

        let lod_ratios = match &limits.lod_ratios {
            None => Vec::new(),
            Some(ratios) if ratios.is_empty() => DEFAULT_LOD_RATIOS.to_vec(),
            Some(ratios) => {
                for r in ratios {
                    if !(*r > 0.0 && *r < 1.0) {
                        return Err(ForgeError::ConfigError(format!(
                            "Platform '{}' LOD ratio {} out of range (0, 1)",
                            name, r
                        )));
                    }
                }
                ratios.clone()
            }
        };

        if limits.max_triangles == 0 {
            return Err(ForgeError::ConfigError(format!(
                "Platform '{}' has a zero triangle ceiling",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            max_triangles: limits.max_triangles,
            lod_ratios,
            max_texture_size: limits.max_texture_size,
            formats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> PlatformLimits {
        PlatformLimits {
            max_triangles: 20000,
            lod_ratios: Some(vec![]),
            max_texture_size: 1024,
            formats: vec!["glb".to_string(), "obj".to_string()],
        }
    }

    #[test]
    fn test_from_limits() {
        let profile = PlatformProfile::from_limits("imvu", &limits()).unwrap();
        assert_eq!(profile.name, "imvu");
        assert_eq!(profile.max_triangles, 20000);
        assert_eq!(profile.lod_ratios, DEFAULT_LOD_RATIOS.to_vec());
        assert_eq!(profile.formats.len(), 2);
    }

    #[test]
    fn test_lod_disabled() {
        let mut l = limits();
        l.lod_ratios = None;
        let profile = PlatformProfile::from_limits("imvu", &l).unwrap();
        assert!(profile.lod_ratios.is_empty());
    }

    #[test]
    fn test_custom_lod_ratios() {
        let mut l = limits();
        l.lod_ratios = Some(vec![0.5, 0.25]);
        let profile = PlatformProfile::from_limits("imvu", &l).unwrap();
        assert_eq!(profile.lod_ratios, vec![0.5, 0.25]);
    }

    #[test]
    fn test_invalid_lod_ratio_rejected() {
        let mut l = limits();
        l.lod_ratios = Some(vec![1.5]);
        assert!(PlatformProfile::from_limits("imvu", &l).is_err());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let mut l = limits();
        l.formats = vec!["fbx".to_string()];
        assert!(PlatformProfile::from_limits("imvu", &l).is_err());
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let mut l = limits();
        l.max_triangles = 0;
        assert!(PlatformProfile::from_limits("imvu", &l).is_err());
    }
}
