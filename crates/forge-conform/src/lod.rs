//! Level-of-detail tier generation
//!
//! Each tier is an independent simplification pass from the already
//! conformant base mesh, targeting `base_triangles * ratio`. Tier
//! triangle counts are strictly decreasing; a tier that cannot get
//! strictly below the previous one is dropped rather than emitted.

use crate::mesh::RawMesh;
use crate::simplify::simplify_to_target;
use serde::{Deserialize, Serialize};

/// Default reduction ladder below the base mesh
/// (base itself is tier 0 at ratio 1.0)
pub const DEFAULT_LOD_RATIOS: [f32; 4] = [0.6, 0.35, 0.15, 0.05];

/// One generated LOD tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LodTier {
    /// Tier number, starting at 1 below the base mesh
    pub level: usize,
    /// Reduction ratio relative to the base mesh
    pub ratio: f32,
    pub mesh: RawMesh,
}

impl LodTier {
    pub fn triangle_count(&self) -> u32 {
        self.mesh.triangle_count()
    }
}

/// Generate LOD tiers from a conformant base mesh.
///
/// LOD meshes drop the base texture; all tiers share the base
/// material and texture at render time.
pub fn generate_lod_tiers(base: &RawMesh, ratios: &[f32]) -> Vec<LodTier> {
    let base_triangles = base.triangle_count();
    let mut tiers = Vec::new();
    let mut previous = base_triangles;

    for (i, ratio) in ratios.iter().enumerate() {
        let target = ((base_triangles as f64 * *ratio as f64) as u32).max(1);
        if target >= previous {
            continue;
        }
        let mesh = match simplify_to_target(base, target) {
            Some(m) => m,
            None => continue,
        };
        let tris = mesh.triangle_count();
        if tris == 0 || tris >= previous {
            continue;
        }
        previous = tris;
        tiers.push(LodTier {
            level: i + 1,
            ratio: *ratio,
            mesh: RawMesh {
                texture: None,
                ..mesh
            },
        });
    }

    tiers
}
