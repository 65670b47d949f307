//! GLB importer for prior meshes
//!
//! Loads a glTF/GLB file into a single `RawMesh`, merging primitives.
//! Used by the mesh-refiner backend to read the caller's input mesh
//! and by the remote backend to parse downloaded model data.

use crate::mesh::{Material, RawMesh};
use forge_core::{ForgeError, Result};
use std::path::Path;

/// Import a glTF or GLB file as one merged mesh
pub fn import_glb<P: AsRef<Path>>(path: P) -> Result<RawMesh> {
    let path = path.as_ref();
    let (document, buffers, _images) = gltf::import(path)
        .map_err(|e| ForgeError::ImportError(format!("Failed to import glTF: {}", e)))?;

    let name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("imported")
        .to_string();

    merge_document(name, &document, &buffers)
        .ok_or_else(|| {
            ForgeError::ImportError(format!("{} contains no mesh geometry", path.display()))
        })
}

/// Import an in-memory GLB blob as one merged mesh
pub fn import_glb_slice(name: &str, bytes: &[u8]) -> Result<RawMesh> {
    let (document, buffers, _images) = gltf::import_slice(bytes)
        .map_err(|e| ForgeError::ImportError(format!("Failed to parse GLB data: {}", e)))?;

    merge_document(name.to_string(), &document, &buffers).ok_or_else(|| {
        ForgeError::ImportError("GLB data contains no mesh geometry".to_string())
    })
}

fn merge_document(
    name: String,
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
) -> Option<RawMesh> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut material = Material::default();
    let mut material_taken = false;

    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let prim_positions: Vec<[f32; 3]> = reader
                .read_positions()
                .map(|iter| iter.collect())
                .unwrap_or_default();
            if prim_positions.is_empty() {
                continue;
            }
            let base = positions.len() as u32;

            let prim_normals: Vec<[f32; 3]> = reader
                .read_normals()
                .map(|iter| iter.collect())
                .unwrap_or_default();
            let prim_uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|iter| iter.into_f32().collect())
                .unwrap_or_default();
            let prim_indices: Vec<u32> = reader
                .read_indices()
                .map(|iter| iter.into_u32().collect())
                .unwrap_or_else(|| (0..prim_positions.len() as u32).collect());

            // Attribute arrays stay parallel across merged primitives:
            // drop normals/uvs entirely if any primitive lacks them
            if prim_normals.len() == prim_positions.len() && normals.len() == positions.len() {
                normals.extend_from_slice(&prim_normals);
            } else {
                normals.clear();
            }
            if prim_uvs.len() == prim_positions.len() && uvs.len() == positions.len() {
                uvs.extend_from_slice(&prim_uvs);
            } else {
                uvs.clear();
            }

            positions.extend_from_slice(&prim_positions);
            indices.extend(prim_indices.iter().map(|i| i + base));

            if !material_taken {
                let pbr = primitive.material().pbr_metallic_roughness();
                material = Material {
                    name: primitive
                        .material()
                        .name()
                        .unwrap_or("imported")
                        .to_string(),
                    base_color: pbr.base_color_factor(),
                    roughness: pbr.roughness_factor(),
                    metallic: pbr.metallic_factor(),
                };
                material_taken = true;
            }
        }
    }

    if positions.is_empty() {
        return None;
    }

    Some(RawMesh {
        name,
        positions,
        normals,
        uvs,
        indices,
        material,
        texture: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{encode_mesh, ExportFormat};
    use crate::mesh::Material;

    fn temp_dir() -> std::path::PathBuf {
        let dir =
            std::env::temp_dir().join(format!("forge_import_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_import_our_own_glb() {
        let dir = temp_dir();
        let mesh = RawMesh {
            name: "tri".to_string(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            indices: vec![0, 1, 2],
            material: Material::default(),
            texture: None,
        };
        let bytes = encode_mesh(&mesh, ExportFormat::Glb).unwrap();
        let path = dir.join("tri.glb");
        std::fs::write(&path, &bytes).unwrap();

        let imported = import_glb(&path).unwrap();
        assert_eq!(imported.triangle_count(), 1);
        assert_eq!(imported.vertex_count(), 3);
        assert_eq!(imported.normals.len(), 3);
        assert_eq!(imported.uvs.len(), 3);
        assert_eq!(imported.name, "tri");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_import_missing_file() {
        assert!(import_glb("/nonexistent/nope.glb").is_err());
    }

    #[test]
    fn test_import_slice() {
        let mesh = RawMesh {
            name: "tri".to_string(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![],
            uvs: vec![],
            indices: vec![0, 1, 2],
            material: Material::default(),
            texture: None,
        };
        let bytes = encode_mesh(&mesh, ExportFormat::Glb).unwrap();
        let imported = import_glb_slice("downloaded", &bytes).unwrap();
        assert_eq!(imported.name, "downloaded");
        assert_eq!(imported.triangle_count(), 1);
    }

    #[test]
    fn test_import_slice_garbage() {
        assert!(import_glb_slice("x", b"not a glb").is_err());
    }
}
