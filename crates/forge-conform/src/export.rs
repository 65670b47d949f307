//! Mesh exporters
//!
//! Each exporter encodes a conformant mesh into one delivery format.
//! Exporters are independently fallible; the pipeline collects
//! per-format outcomes instead of aborting the bundle on the first
//! failure.

use crate::mesh::RawMesh;
use forge_core::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

/// Delivery format for an exported mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Glb,
    Obj,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Glb => "glb",
            ExportFormat::Obj => "obj",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ForgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "glb" => Ok(ExportFormat::Glb),
            "obj" => Ok(ExportFormat::Obj),
            other => Err(ForgeError::ConfigError(format!(
                "Unknown export format '{}'. Available: glb, obj",
                other
            ))),
        }
    }
}

/// Encode a mesh into the given format
pub fn encode_mesh(mesh: &RawMesh, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Glb => encode_glb(mesh),
        ExportFormat::Obj => encode_obj(mesh),
    }
}

/// Encode a binary glTF 2.0 container with a single mesh primitive
fn encode_glb(mesh: &RawMesh) -> Result<Vec<u8>> {
    if mesh.positions.is_empty() || mesh.indices.is_empty() {
        return Err(ForgeError::ExportFailure {
            format: "glb".to_string(),
            detail: "Mesh has no geometry".to_string(),
        });
    }

    let has_normals = mesh.normals.len() == mesh.positions.len();
    let has_uvs = mesh.uvs.len() == mesh.positions.len();
    let bounds = mesh.bounds().ok_or_else(|| ForgeError::ExportFailure {
        format: "glb".to_string(),
        detail: "Mesh has no bounds".to_string(),
    })?;

    // Binary buffer: positions, then normals/uvs when present, then
    // u32 indices. Every section is 4-byte aligned by construction.
    let mut bin = Vec::new();
    let pos_offset = 0usize;
    for p in &mesh.positions {
        for v in p {
            bin.extend_from_slice(&v.to_le_bytes());
        }
    }
    let norm_offset = bin.len();
    if has_normals {
        for n in &mesh.normals {
            for v in n {
                bin.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    let uv_offset = bin.len();
    if has_uvs {
        for uv in &mesh.uvs {
            for v in uv {
                bin.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    let index_offset = bin.len();
    for i in &mesh.indices {
        bin.extend_from_slice(&i.to_le_bytes());
    }

    let mut buffer_views = vec![serde_json::json!({
        "buffer": 0,
        "byteOffset": pos_offset,
        "byteLength": mesh.positions.len() * 12,
        "target": 34962
    })];
    let mut accessors = vec![serde_json::json!({
        "bufferView": 0,
        "componentType": 5126,
        "count": mesh.positions.len(),
        "type": "VEC3",
        "min": bounds.min,
        "max": bounds.max
    })];
    let mut attributes = serde_json::json!({ "POSITION": 0 });

    if has_normals {
        buffer_views.push(serde_json::json!({
            "buffer": 0,
            "byteOffset": norm_offset,
            "byteLength": mesh.normals.len() * 12,
            "target": 34962
        }));
        accessors.push(serde_json::json!({
            "bufferView": buffer_views.len() - 1,
            "componentType": 5126,
            "count": mesh.normals.len(),
            "type": "VEC3"
        }));
        attributes["NORMAL"] = serde_json::json!(accessors.len() - 1);
    }
    if has_uvs {
        buffer_views.push(serde_json::json!({
            "buffer": 0,
            "byteOffset": uv_offset,
            "byteLength": mesh.uvs.len() * 8,
            "target": 34962
        }));
        accessors.push(serde_json::json!({
            "bufferView": buffer_views.len() - 1,
            "componentType": 5126,
            "count": mesh.uvs.len(),
            "type": "VEC2"
        }));
        attributes["TEXCOORD_0"] = serde_json::json!(accessors.len() - 1);
    }

    buffer_views.push(serde_json::json!({
        "buffer": 0,
        "byteOffset": index_offset,
        "byteLength": mesh.indices.len() * 4,
        "target": 34963
    }));
    accessors.push(serde_json::json!({
        "bufferView": buffer_views.len() - 1,
        "componentType": 5125,
        "count": mesh.indices.len(),
        "type": "SCALAR"
    }));
    let index_accessor = accessors.len() - 1;

    let json = serde_json::json!({
        "asset": { "version": "2.0", "generator": "meshforge" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "name": mesh.name }],
        "meshes": [{
            "name": mesh.name,
            "primitives": [{
                "attributes": attributes,
                "indices": index_accessor,
                "material": 0
            }]
        }],
        "materials": [{
            "name": mesh.material.name,
            "pbrMetallicRoughness": {
                "baseColorFactor": mesh.material.base_color,
                "roughnessFactor": mesh.material.roughness,
                "metallicFactor": mesh.material.metallic
            }
        }],
        "bufferViews": buffer_views,
        "accessors": accessors,
        "buffers": [{ "byteLength": bin.len() }]
    });

    let json_str = serde_json::to_string(&json).map_err(|e| ForgeError::ExportFailure {
        format: "glb".to_string(),
        detail: format!("Failed to serialize GLB JSON: {}", e),
    })?;

    // Pad JSON chunk to 4-byte alignment with spaces
    let json_bytes = json_str.as_bytes();
    let json_padded_len = (json_bytes.len() + 3) & !3;
    let mut json_padded = json_bytes.to_vec();
    json_padded.resize(json_padded_len, b' ');

    // Binary chunk is already aligned (all sections are multiples of 4)
    let total_len = 12 + 8 + json_padded.len() as u32 + 8 + bin.len() as u32;

    let mut out = Vec::with_capacity(total_len as usize);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&total_len.to_le_bytes());

    out.extend_from_slice(&(json_padded.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F534Au32.to_le_bytes()); // "JSON"
    out.extend_from_slice(&json_padded);

    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x004E4942u32.to_le_bytes()); // "BIN\0"
    out.extend_from_slice(&bin);

    Ok(out)
}

/// Encode a Wavefront OBJ text file
fn encode_obj(mesh: &RawMesh) -> Result<Vec<u8>> {
    if mesh.positions.is_empty() || mesh.indices.is_empty() {
        return Err(ForgeError::ExportFailure {
            format: "obj".to_string(),
            detail: "Mesh has no geometry".to_string(),
        });
    }

    let has_normals = mesh.normals.len() == mesh.positions.len();
    let has_uvs = mesh.uvs.len() == mesh.positions.len();

    let mut obj = String::new();
    let _ = writeln!(obj, "# exported by meshforge");
    let _ = writeln!(obj, "o {}", mesh.name);
    for p in &mesh.positions {
        let _ = writeln!(obj, "v {} {} {}", p[0], p[1], p[2]);
    }
    if has_uvs {
        for uv in &mesh.uvs {
            let _ = writeln!(obj, "vt {} {}", uv[0], uv[1]);
        }
    }
    if has_normals {
        for n in &mesh.normals {
            let _ = writeln!(obj, "vn {} {} {}", n[0], n[1], n[2]);
        }
    }

    // OBJ indices are 1-based
    for face in mesh.indices.chunks_exact(3) {
        let _ = write!(obj, "f");
        for &i in face {
            let i = i + 1;
            match (has_uvs, has_normals) {
                (true, true) => {
                    let _ = write!(obj, " {}/{}/{}", i, i, i);
                }
                (true, false) => {
                    let _ = write!(obj, " {}/{}", i, i);
                }
                (false, true) => {
                    let _ = write!(obj, " {}//{}", i, i);
                }
                (false, false) => {
                    let _ = write!(obj, " {}", i);
                }
            }
        }
        let _ = writeln!(obj);
    }

    Ok(obj.into_bytes())
}
