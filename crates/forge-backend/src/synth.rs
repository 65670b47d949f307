//! Deterministic procedural mesh synthesis
//!
//! The local backends stand in for real model inference (out of scope
//! here) but must behave like it: dense, watertight-ish geometry whose
//! density tracks the requested quality, fully determined by the seed.
//! Synthesis builds a displaced UV sphere.

use forge_conform::{Material, RawMesh, TextureMap};
use forge_core::{GenerationParams, QualityMode};
use glam::Vec3;

/// Resolve the triangle density a backend should generate at
pub fn target_triangles(params: &GenerationParams) -> u32 {
    params.target_triangles.unwrap_or(match params.quality {
        QualityMode::Fast => 5_000,
        QualityMode::Balanced => 50_000,
        QualityMode::Quality => 200_000,
    })
}

/// Fold text and an optional explicit seed into a synthesis seed
pub fn hash_seed(text: &str, explicit: Option<u64>) -> u64 {
    let folded = text
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
            (acc ^ b as u64).wrapping_mul(0x100_0000_01b3)
        });
    folded ^ explicit.unwrap_or(0)
}

/// Generate a displaced sphere with roughly `target_triangles`
/// triangles, radial normals, spherical UVs, and a solid-color
/// texture derived from the seed.
pub fn synthesize_blob(name: &str, seed: u64, target: u32, texture_size: u32) -> RawMesh {
    // Grid sphere: (rings+1) x (segments+1) vertices, 2*rings*segments
    // triangles with segments = 2*rings
    let rings = (((target.max(8) as f64) / 4.0).sqrt().ceil() as u32).max(2);
    let segments = rings * 2;

    let mut rng = seed;
    let amp = 0.1 + 0.1 * next_unit(&mut rng);
    let freq_a = 2.0 + (next_unit(&mut rng) * 5.0).floor();
    let freq_b = 2.0 + (next_unit(&mut rng) * 5.0).floor();
    let phase = next_unit(&mut rng) * std::f32::consts::TAU;

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let theta = v * std::f32::consts::PI;
        for segment in 0..=segments {
            let u = segment as f32 / segments as f32;
            let phi = u * std::f32::consts::TAU;

            let dir = Vec3::new(
                theta.sin() * phi.cos(),
                theta.cos(),
                theta.sin() * phi.sin(),
            );
            let displacement =
                1.0 + amp * (freq_a * theta + phase).sin() * (freq_b * phi).cos();
            positions.push((dir * displacement).to_array());
            normals.push(dir.to_array());
            uvs.push([u, v]);
        }
    }

    let stride = segments + 1;
    let mut indices = Vec::new();
    for ring in 0..rings {
        for segment in 0..segments {
            let i = ring * stride + segment;
            indices.extend_from_slice(&[i, i + stride, i + 1]);
            indices.extend_from_slice(&[i + 1, i + stride, i + stride + 1]);
        }
    }

    let color = color_from_seed(seed);
    RawMesh {
        name: name.to_string(),
        positions,
        normals,
        uvs,
        indices,
        material: Material {
            name: format!("{}_mat", name),
            base_color: [
                color[0] as f32 / 255.0,
                color[1] as f32 / 255.0,
                color[2] as f32 / 255.0,
                1.0,
            ],
            roughness: 0.7,
            metallic: 0.0,
        },
        texture: Some(TextureMap::solid(texture_size, texture_size, color)),
    }
}

fn color_from_seed(seed: u64) -> [u8; 4] {
    [
        ((seed >> 16) & 0xFF) as u8,
        ((seed >> 8) & 0xFF) as u8,
        (seed & 0xFF) as u8,
        255,
    ]
}

/// splitmix64 step mapped to [0, 1)
fn next_unit(state: &mut u64) -> f32 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z >> 40) as f32 / (1u64 << 24) as f32
}
