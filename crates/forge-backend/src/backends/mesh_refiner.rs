//! Mesh refinement backend
//!
//! Takes a prior GLB mesh and cleans it up: welds coincident
//! vertices, drops the degenerate faces the weld exposes, and
//! recomputes smooth per-vertex normals. Purely geometric, so the
//! backend is deterministic.

use crate::backend::{check_input_supported, BackendInfo, BackendStatus, GenerateCtx, ModelBackend};
use forge_conform::{import_glb, RawMesh};
use forge_core::{BackendKind, GenerationRequest, InputPayload, Result};
use glam::Vec3;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Weld tolerance as a fraction of the mesh's largest extent
const WELD_EPSILON: f32 = 1e-4;

pub struct MeshRefinerBackend {
    loaded: AtomicBool,
}

impl MeshRefinerBackend {
    pub fn new() -> Self {
        Self {
            loaded: AtomicBool::new(false),
        }
    }
}

impl Default for MeshRefinerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBackend for MeshRefinerBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: "mesh_refiner".to_string(),
            kind: BackendKind::MeshRefiner,
            supported_inputs: vec!["mesh"],
            footprint_mb: 2000,
            approx_latency_secs: 10.0,
            deterministic: true,
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
        ctx.check_cancelled()?;
        ctx.check_deadline()?;
        check_input_supported(&self.info(), request)?;

        let path = match &request.input {
            InputPayload::Mesh(p) => p,
            _ => unreachable!("input support checked above"),
        };
        let imported = import_glb(path)?;

        let mut refined = weld_vertices(&imported);
        refined.name = request.name.clone();
        refined.normals = smooth_normals(&refined);
        Ok(refined)
    }

    fn unload(&self) -> Result<()> {
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Merge vertices closer than the weld tolerance, dropping faces that
/// collapse in the process
fn weld_vertices(mesh: &RawMesh) -> RawMesh {
    let extent = mesh
        .bounds()
        .map(|b| {
            let s = b.size();
            s[0].max(s[1]).max(s[2])
        })
        .unwrap_or(1.0)
        .max(f32::EPSILON);
    let cell = extent * WELD_EPSILON;

    let quantize = |p: &[f32; 3]| -> (i64, i64, i64) {
        (
            (p[0] / cell).round() as i64,
            (p[1] / cell).round() as i64,
            (p[2] / cell).round() as i64,
        )
    };

    let has_uvs = mesh.uvs.len() == mesh.positions.len();
    let mut lookup: HashMap<(i64, i64, i64), u32> = HashMap::new();
    let mut remap = Vec::with_capacity(mesh.positions.len());
    let mut positions = Vec::new();
    let mut uvs = Vec::new();

    for (i, p) in mesh.positions.iter().enumerate() {
        let key = quantize(p);
        let next = positions.len() as u32;
        let index = *lookup.entry(key).or_insert(next);
        if index == next {
            positions.push(*p);
            if has_uvs {
                uvs.push(mesh.uvs[i]);
            }
        }
        remap.push(index);
    }

    let mut indices = Vec::new();
    for face in mesh.indices.chunks_exact(3) {
        let a = remap[face[0] as usize];
        let b = remap[face[1] as usize];
        let c = remap[face[2] as usize];
        if a != b && b != c && a != c {
            indices.extend_from_slice(&[a, b, c]);
        }
    }

    RawMesh {
        name: mesh.name.clone(),
        positions,
        normals: vec![],
        uvs,
        indices,
        material: mesh.material.clone(),
        texture: mesh.texture.clone(),
    }
}

/// Area-weighted smooth per-vertex normals
fn smooth_normals(mesh: &RawMesh) -> Vec<[f32; 3]> {
    let mut accum = vec![Vec3::ZERO; mesh.positions.len()];
    for face in mesh.indices.chunks_exact(3) {
        let a = Vec3::from_array(mesh.positions[face[0] as usize]);
        let b = Vec3::from_array(mesh.positions[face[1] as usize]);
        let c = Vec3::from_array(mesh.positions[face[2] as usize]);
        // Cross product length is proportional to face area
        let face_normal = (b - a).cross(c - a);
        for &i in face {
            accum[i as usize] += face_normal;
        }
    }
    accum
        .iter()
        .map(|n| n.normalize_or_zero().to_array())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_conform::{encode_mesh, ExportFormat, Material};

    fn temp_dir() -> std::path::PathBuf {
        let dir =
            std::env::temp_dir().join(format!("forge_refine_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Two triangles sharing an edge, but with the shared vertices
    /// duplicated instead of indexed
    fn split_quad() -> RawMesh {
        RawMesh {
            name: "split".to_string(),
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            normals: vec![[0.0, 0.0, 1.0]; 6],
            uvs: vec![],
            indices: vec![0, 1, 2, 3, 4, 5],
            material: Material::default(),
            texture: None,
        }
    }

    #[test]
    fn test_weld_merges_duplicates() {
        let welded = weld_vertices(&split_quad());
        assert_eq!(welded.vertex_count(), 4);
        assert_eq!(welded.triangle_count(), 2);
    }

    #[test]
    fn test_smooth_normals_unit_length() {
        let mut mesh = weld_vertices(&split_quad());
        mesh.normals = smooth_normals(&mesh);
        for n in &mesh.normals {
            let len = Vec3::from_array(*n).length();
            assert!((len - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_refine_roundtrip_through_glb() {
        let dir = temp_dir();
        let bytes = encode_mesh(&split_quad(), ExportFormat::Glb).unwrap();
        let path = dir.join("split.glb");
        std::fs::write(&path, &bytes).unwrap();

        let backend = MeshRefinerBackend::new();
        let request = GenerationRequest::new(
            "cleaned",
            BackendKind::MeshRefiner,
            InputPayload::Mesh(path),
        );
        let refined = backend
            .generate(&request, &GenerateCtx::unbounded())
            .unwrap();

        assert_eq!(refined.name, "cleaned");
        assert_eq!(refined.vertex_count(), 4);
        assert_eq!(refined.triangle_count(), 2);
        assert_eq!(refined.normals.len(), refined.positions.len());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_mesh_file() {
        let backend = MeshRefinerBackend::new();
        let request = GenerationRequest::new(
            "x",
            BackendKind::MeshRefiner,
            InputPayload::Mesh("/nonexistent/a.glb".into()),
        );
        assert!(backend
            .generate(&request, &GenerateCtx::unbounded())
            .is_err());
    }
}
