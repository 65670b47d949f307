//! Texture resolution conformance
//!
//! Platforms declare a texture resolution ceiling; anything larger is
//! resampled down. Output dimensions snap to the power-of-two ladder
//! (4096 / 2048 / 1024 / 512 / ...) used by the avatar platforms.

use crate::mesh::TextureMap;
use forge_core::{ForgeError, Result};
use image::imageops::FilterType;
use image::RgbaImage;

/// Clamp a texture to the platform resolution ceiling.
///
/// Textures already within the ceiling are returned unchanged. Larger
/// textures are resized so the longest edge equals the largest power
/// of two at or under the ceiling, preserving aspect ratio.
pub fn clamp_texture(texture: &TextureMap, max_size: u32) -> Result<TextureMap> {
    if max_size == 0 {
        return Err(ForgeError::ConfigError(
            "Texture ceiling of zero".to_string(),
        ));
    }
    let longest = texture.width.max(texture.height);
    if longest <= max_size {
        return Ok(texture.clone());
    }

    let target_longest = floor_power_of_two(max_size);
    let scale = target_longest as f64 / longest as f64;
    let new_width = ((texture.width as f64 * scale).round() as u32).max(1);
    let new_height = ((texture.height as f64 * scale).round() as u32).max(1);

    let img = RgbaImage::from_raw(texture.width, texture.height, texture.pixels.clone())
        .ok_or_else(|| {
            ForgeError::ExportFailure {
                format: "texture".to_string(),
                detail: format!(
                    "Pixel buffer does not match {}x{}",
                    texture.width, texture.height
                ),
            }
        })?;
    let resized = image::imageops::resize(&img, new_width, new_height, FilterType::Triangle);

    Ok(TextureMap {
        width: new_width,
        height: new_height,
        pixels: resized.into_raw(),
    })
}

/// Largest power of two at or under `n` (n >= 1)
fn floor_power_of_two(n: u32) -> u32 {
    let next = n.next_power_of_two();
    if next == n {
        n
    } else {
        next / 2
    }
}
