//! Progressive mesh simplification
//!
//! Uses uniform-grid vertex clustering: vertices falling into the same
//! grid cell collapse to their average, degenerate and duplicate faces
//! are dropped. The grid resolution shrinks round by round until the
//! triangle count is at or under the target. The round budget is hard;
//! callers treat an exhausted budget as a conformance failure, never
//! as permission to emit an oversized mesh.

use crate::mesh::RawMesh;
use glam::Vec3;
use std::collections::{HashMap, HashSet};

/// Maximum clustering rounds before giving up on a target
pub const MAX_SIMPLIFY_ROUNDS: u32 = 16;

const MIN_RESOLUTION: u32 = 2;
const MAX_RESOLUTION: u32 = 1024;

/// Simplify `mesh` until its triangle count is at or under
/// `target_triangles`.
///
/// Returns `None` when the round budget is exhausted without reaching
/// the target (or when every candidate collapses the mesh to nothing).
pub fn simplify_to_target(mesh: &RawMesh, target_triangles: u32) -> Option<RawMesh> {
    if mesh.triangle_count() <= target_triangles {
        return Some(mesh.clone());
    }
    if mesh.positions.is_empty() {
        return Some(mesh.clone());
    }

    // Occupied surface cells scale roughly with resolution^2, two
    // triangles per cell
    let mut resolution = ((target_triangles as f64 / 2.0).sqrt().ceil() as u32)
        .clamp(MIN_RESOLUTION, MAX_RESOLUTION);

    for _ in 0..MAX_SIMPLIFY_ROUNDS {
        let candidate = cluster_at_resolution(mesh, resolution);
        let tris = candidate.triangle_count();

        if tris > 0 && tris <= target_triangles {
            return Some(candidate);
        }

        if tris > target_triangles {
            // Still too dense: coarsen the grid
            if resolution == MIN_RESOLUTION {
                return None;
            }
            resolution = (resolution * 3 / 4).max(MIN_RESOLUTION);
        } else {
            // Collapsed to nothing: refine the grid
            if resolution >= MAX_RESOLUTION {
                return None;
            }
            resolution = (resolution * 2).min(MAX_RESOLUTION);
        }
    }

    None
}

/// One clustering pass at a fixed grid resolution
fn cluster_at_resolution(mesh: &RawMesh, resolution: u32) -> RawMesh {
    let bounds = match mesh.bounds() {
        Some(b) => b,
        None => return mesh.clone(),
    };
    let min = Vec3::from_array(bounds.min);
    let size = Vec3::from_array(bounds.size());

    let has_normals = mesh.normals.len() == mesh.positions.len();
    let has_uvs = mesh.uvs.len() == mesh.positions.len();

    let cell_of = |p: &[f32; 3]| -> (u32, u32, u32) {
        let p = Vec3::from_array(*p);
        let mut cell = [0u32; 3];
        for axis in 0..3 {
            let extent = size[axis];
            cell[axis] = if extent <= f32::EPSILON {
                0
            } else {
                let t = ((p[axis] - min[axis]) / extent) * resolution as f32;
                (t as u32).min(resolution - 1)
            };
        }
        (cell[0], cell[1], cell[2])
    };

    // Assign each vertex to a cluster and accumulate averages
    let mut cluster_index: HashMap<(u32, u32, u32), u32> = HashMap::new();
    let mut remap: Vec<u32> = Vec::with_capacity(mesh.positions.len());
    let mut position_sums: Vec<(Vec3, u32)> = Vec::new();
    let mut normal_sums: Vec<Vec3> = Vec::new();
    let mut uv_sums: Vec<[f32; 2]> = Vec::new();

    for (i, p) in mesh.positions.iter().enumerate() {
        let key = cell_of(p);
        let next_index = position_sums.len() as u32;
        let index = *cluster_index.entry(key).or_insert(next_index);
        if index == next_index {
            position_sums.push((Vec3::ZERO, 0));
            if has_normals {
                normal_sums.push(Vec3::ZERO);
            }
            if has_uvs {
                uv_sums.push([0.0, 0.0]);
            }
        }
        let (sum, count) = &mut position_sums[index as usize];
        *sum += Vec3::from_array(*p);
        *count += 1;
        if has_normals {
            normal_sums[index as usize] += Vec3::from_array(mesh.normals[i]);
        }
        if has_uvs {
            let uv = &mut uv_sums[index as usize];
            uv[0] += mesh.uvs[i][0];
            uv[1] += mesh.uvs[i][1];
        }
        remap.push(index);
    }

    let positions: Vec<[f32; 3]> = position_sums
        .iter()
        .map(|(sum, count)| (*sum / *count as f32).to_array())
        .collect();
    let normals: Vec<[f32; 3]> = normal_sums
        .iter()
        .map(|n| n.normalize_or_zero().to_array())
        .collect();
    let uvs: Vec<[f32; 2]> = uv_sums
        .iter()
        .zip(position_sums.iter())
        .map(|(uv, (_, count))| [uv[0] / *count as f32, uv[1] / *count as f32])
        .collect();

    // Remap faces, dropping degenerates and duplicates
    let mut seen: HashSet<[u32; 3]> = HashSet::new();
    let mut indices = Vec::new();
    for face in mesh.indices.chunks_exact(3) {
        let a = remap[face[0] as usize];
        let b = remap[face[1] as usize];
        let c = remap[face[2] as usize];
        if a == b || b == c || a == c {
            continue;
        }
        if seen.insert(canonical_face(a, b, c)) {
            indices.extend_from_slice(&[a, b, c]);
        }
    }

    RawMesh {
        name: mesh.name.clone(),
        positions,
        normals,
        uvs,
        indices,
        material: mesh.material.clone(),
        texture: mesh.texture.clone(),
    }
}

/// Rotate a face so the smallest index is first, preserving winding
fn canonical_face(a: u32, b: u32, c: u32) -> [u32; 3] {
    if a <= b && a <= c {
        [a, b, c]
    } else if b <= a && b <= c {
        [b, c, a]
    } else {
        [c, a, b]
    }
}
