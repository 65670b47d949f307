//! Raw mesh and material types produced by backends

use serde::{Deserialize, Serialize};

/// PBR material parameters attached to a mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// RGBA base color factor
    pub base_color: [f32; 4],
    pub roughness: f32,
    pub metallic: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [0.8, 0.8, 0.8, 1.0],
            roughness: 0.7,
            metallic: 0.0,
        }
    }
}

/// An RGBA8 texture owned by a mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureMap {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels, row-major
    pub pixels: Vec<u8>,
}

impl TextureMap {
    /// Create a solid-color texture
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        // usize arithmetic: width * height * 4 can exceed u32
        let pixel_count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }
}

/// Geometry + material output from a backend invocation.
/// Immutable once produced; the conformance pipeline derives new
/// meshes rather than mutating this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex normals; empty when the backend did not produce them
    pub normals: Vec<[f32; 3]>,
    /// Per-vertex texture coordinates; empty when absent
    pub uvs: Vec<[f32; 2]>,
    /// Triangle indices, three per face
    pub indices: Vec<u32>,
    pub material: Material,
    #[serde(default)]
    pub texture: Option<TextureMap>,
}

impl RawMesh {
    pub fn triangle_count(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }

    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    /// Axis-aligned bounding box of the vertex positions
    pub fn bounds(&self) -> Option<MeshBounds> {
        MeshBounds::from_positions(&self.positions)
    }

    /// Rough in-memory size, used for cache accounting
    pub fn size_estimate_bytes(&self) -> usize {
        self.positions.len() * 12
            + self.normals.len() * 12
            + self.uvs.len() * 8
            + self.indices.len() * 4
            + self.texture.as_ref().map(|t| t.size_bytes()).unwrap_or(0)
    }
}

/// Axis-aligned bounding box computed from vertex positions
#[derive(Debug, Clone, Copy)]
pub struct MeshBounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl MeshBounds {
    /// Compute bounds from a set of vertex positions
    pub fn from_positions(positions: &[[f32; 3]]) -> Option<Self> {
        if positions.is_empty() {
            return None;
        }
        let mut min = positions[0];
        let mut max = positions[0];
        for p in positions.iter().skip(1) {
            for i in 0..3 {
                if p[i] < min[i] {
                    min[i] = p[i];
                }
                if p[i] > max[i] {
                    max[i] = p[i];
                }
            }
        }
        Some(Self { min, max })
    }

    /// Size along each axis
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_count() {
        let mesh = RawMesh {
            name: "tri".to_string(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![],
            uvs: vec![],
            indices: vec![0, 1, 2],
            material: Material::default(),
            texture: None,
        };
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn test_bounds() {
        let positions = vec![[-1.0, 0.0, 2.0], [3.0, -2.0, 0.0], [0.0, 1.0, 1.0]];
        let bounds = MeshBounds::from_positions(&positions).unwrap();
        assert_eq!(bounds.min, [-1.0, -2.0, 0.0]);
        assert_eq!(bounds.max, [3.0, 1.0, 2.0]);
        assert_eq!(bounds.size(), [4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_bounds_empty() {
        assert!(MeshBounds::from_positions(&[]).is_none());
    }

    #[test]
    fn test_solid_texture_rectangular() {
        let tex = TextureMap::solid(40000, 2, [1, 2, 3, 4]);
        assert_eq!(tex.size_bytes(), 40000 * 2 * 4);
        assert_eq!(&tex.pixels[0..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_size_estimate_includes_texture() {
        let mut mesh = RawMesh {
            name: "m".to_string(),
            positions: vec![[0.0; 3]; 4],
            normals: vec![],
            uvs: vec![],
            indices: vec![0, 1, 2, 0, 2, 3],
            material: Material::default(),
            texture: None,
        };
        let bare = mesh.size_estimate_bytes();
        mesh.texture = Some(TextureMap::solid(8, 8, [255, 0, 0, 255]));
        assert_eq!(mesh.size_estimate_bytes(), bare + 8 * 8 * 4);
    }
}
