//! Texture loading and atlas building.
//!
//! Every texture referenced by a textured mesh ends up as one layer of a
//! single float RGBA array. All layers share the first texture's size.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;

/// Errors that can occur while loading textures or building the atlas.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TextureError {
    #[error("Failed to load texture {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("Texture {path} has {found} channels instead of 4 (RGBA)")]
    ChannelCount { path: PathBuf, found: u32 },

    #[error(
        "Texture {path} (layer {layer}) is {}x{}, expected {}x{} like the first texture",
        .found.0, .found.1, .expected.0, .expected.1
    )]
    DimensionMismatch {
        path: PathBuf,
        layer: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("Texture {path} is {width}x{height}; textures must be at least 1x1")]
    ZeroSize { path: PathBuf, width: u32, height: u32 },

    #[error("Texture {path} holds {found} floats, expected {expected}")]
    PixelCount {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}

pub type TextureResult<T> = Result<T, TextureError>;

/// A decoded image as reported by a [`TextureSource`].
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,

    /// Channel count of the source file
    pub channels: u32,

    /// Interleaved RGBA floats, row-major, 4 per pixel. Loaders expand
    /// narrower files to RGBA; `channels` keeps the original count.
    pub pixels: Vec<f32>,
}

impl TextureImage {
    /// Size in bytes of the pixel data
    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<f32>()
    }
}

/// Path → decoded float pixels.
///
/// Sources are shared across the atlas builder's worker threads.
pub trait TextureSource: Sync {
    fn load(&self, path: &Path) -> TextureResult<TextureImage>;
}

/// Loads image files from disk with the `image` crate.
///
/// 8/16-bit images are converted from sRGB to linear; float images (EXR,
/// HDR) are taken as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageTextureLoader;

impl TextureSource for ImageTextureLoader {
    fn load(&self, path: &Path) -> TextureResult<TextureImage> {
        let img = image::open(path).map_err(|e| TextureError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let channels = u32::from(img.color().channel_count());
        let is_float = matches!(
            img,
            image::DynamicImage::ImageRgb32F(_) | image::DynamicImage::ImageRgba32F(_)
        );

        let rgba = img.to_rgba32f();
        let (width, height) = rgba.dimensions();
        let mut pixels = rgba.into_raw();

        if !is_float {
            for px in pixels.chunks_exact_mut(4) {
                // Alpha is linear
                for c in &mut px[..3] {
                    *c = srgb_to_linear(*c);
                }
            }
        }

        log::debug!(
            "Loaded texture: {} ({}x{}, {} channels, {:.1} KB)",
            path.display(),
            width,
            height,
            channels,
            (pixels.len() * 4) as f32 / 1024.0
        );

        // `to_rgba32f` always yields 4 floats per pixel; report the file's
        // channel count so non-RGBA files are rejected by the atlas.
        Ok(TextureImage {
            width,
            height,
            channels,
            pixels,
        })
    }
}

/// In-memory texture source keyed by path.
#[derive(Debug, Default, Clone)]
pub struct MemoryTextures {
    images: HashMap<PathBuf, TextureImage>,
}

impl MemoryTextures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, image: TextureImage) {
        self.images.insert(path.into(), image);
    }
}

impl TextureSource for MemoryTextures {
    fn load(&self, path: &Path) -> TextureResult<TextureImage> {
        self.images.get(path).cloned().ok_or_else(|| TextureError::Load {
            path: path.to_path_buf(),
            message: "no such texture".into(),
        })
    }
}

/// Layered float RGBA texture array.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureAtlas {
    pub width: u32,
    pub height: u32,
    pub layers: u32,

    /// `layers * height * width` texels, layer-major then row-major
    pub texels: Vec<[f32; 4]>,
}

impl TextureAtlas {
    /// 1x1x1 stand-in bound when the scene has no textures.
    pub fn placeholder() -> Self {
        Self {
            width: 1,
            height: 1,
            layers: 1,
            texels: vec![[0.0; 4]],
        }
    }

    /// Load `paths` (in texture-id order) and stack them into an atlas.
    ///
    /// Images are decoded in parallel; validation runs in id order so the
    /// first offending path is the one reported.
    pub fn build(paths: &[PathBuf], source: &dyn TextureSource) -> TextureResult<Self> {
        if paths.is_empty() {
            log::debug!("No textures referenced, using placeholder atlas");
            return Ok(Self::placeholder());
        }

        let images: Vec<TextureResult<TextureImage>> =
            paths.par_iter().map(|path| source.load(path)).collect();

        let mut size: Option<(u32, u32)> = None;
        let mut texels = Vec::new();

        for (layer, (path, image)) in paths.iter().zip(images).enumerate() {
            let image = image?;

            if image.channels != 4 {
                return Err(TextureError::ChannelCount {
                    path: path.clone(),
                    found: image.channels,
                });
            }

            if image.width == 0 || image.height == 0 {
                return Err(TextureError::ZeroSize {
                    path: path.clone(),
                    width: image.width,
                    height: image.height,
                });
            }

            let found = (image.width, image.height);
            let expected = *size.get_or_insert(found);
            if found != expected {
                return Err(TextureError::DimensionMismatch {
                    path: path.clone(),
                    layer,
                    expected,
                    found,
                });
            }

            let expected_floats = image.width as usize * image.height as usize * 4;
            if image.pixels.len() != expected_floats {
                return Err(TextureError::PixelCount {
                    path: path.clone(),
                    expected: expected_floats,
                    found: image.pixels.len(),
                });
            }

            if texels.is_empty() {
                texels.reserve(expected_floats / 4 * paths.len());
            }
            texels.extend(
                image
                    .pixels
                    .chunks_exact(4)
                    .map(|p| [p[0], p[1], p[2], p[3]]),
            );
        }

        // Non-empty paths always set the size
        let (width, height) = size.unwrap_or((1, 1));
        let atlas = Self {
            width,
            height,
            layers: paths.len() as u32,
            texels,
        };

        log::info!(
            "Built texture atlas: {} layers of {}x{} ({:.1} MB)",
            atlas.layers,
            atlas.width,
            atlas.height,
            atlas.size_bytes() as f32 / (1024.0 * 1024.0)
        );

        Ok(atlas)
    }

    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }

    /// Texels of one layer
    pub fn layer(&self, index: u32) -> Option<&[[f32; 4]]> {
        let len = self.width as usize * self.height as usize;
        let start = index as usize * len;
        self.texels.get(start..start + len)
    }

    /// Get total size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.texels.len() * std::mem::size_of::<[f32; 4]>()
    }
}

/// Convert an sRGB-encoded channel in [0, 1] to linear.
fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}
