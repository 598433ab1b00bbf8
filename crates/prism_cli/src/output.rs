use std::path::Path;

use anyhow::{bail, Context, Result};
use image::RgbaImage;

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert an accumulated texel to 8-bit RGBA. NaN comes out black.
pub fn texel_to_rgba(texel: [f32; 4]) -> [u8; 4] {
    let channel = |v: f32| (255.0 * linear_to_gamma(v).clamp(0.0, 1.0)) as u8;
    [channel(texel[0]), channel(texel[1]), channel(texel[2]), 255]
}

/// Tone-map a row-major accumulation image.
pub fn to_image(width: u32, height: u32, texels: &[[f32; 4]]) -> Result<RgbaImage> {
    let expected = width as usize * height as usize;
    if texels.len() < expected {
        bail!(
            "Accumulation image has {} texels, expected {}x{}",
            texels.len(),
            width,
            height
        );
    }

    let bytes: Vec<u8> = texels[..expected]
        .iter()
        .flat_map(|&t| texel_to_rgba(t))
        .collect();
    RgbaImage::from_raw(width, height, bytes).context("Image buffer size mismatch")
}

pub fn save_png(path: &Path, width: u32, height: u32, texels: &[[f32; 4]]) -> Result<()> {
    let image = to_image(width, height, texels)?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texel_to_rgba() {
        assert_eq!(texel_to_rgba([0.0, 1.0, 0.25, 0.0]), [0, 255, 127, 255]);
        assert_eq!(texel_to_rgba([-1.0, 4.0, f32::NAN, 1.0]), [0, 255, 0, 255]);
    }

    #[test]
    fn test_to_image_layout() {
        let texels = [[1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]];
        let image = to_image(2, 1, &texels).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_to_image_short_buffer() {
        assert!(to_image(2, 2, &[[0.0; 4]; 3]).is_err());
    }
}
