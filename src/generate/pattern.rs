/// Image synthesis
///
/// Two patterns share one `render` entry point:
/// - Single: uniform fill with the base color
/// - Mandala: concentric rings blending between the base color and a
///   palette of random colors drawn once per image
use image::{Rgb, RgbImage};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::color::RgbColor;
use crate::error::{GeneratorError, Result};

/// Output raster dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GeneratorError::InvalidRange(format!(
                "image size {}x{} must be at least 1x1",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Folder name used on disk, e.g. `640x360`
    pub fn folder_name(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Pixel synthesis strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pattern {
    /// Flat fill
    #[default]
    Single,
    /// Radial multi-color blend; `colors_per_image` includes the base color
    Mandala { colors_per_image: u32 },
}

impl Pattern {
    /// Folder name used on disk
    pub fn folder_name(&self) -> &'static str {
        match self {
            Pattern::Single => "Single",
            Pattern::Mandala { .. } => "Mandala",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Pattern::Mandala { colors_per_image: 0 } => Err(GeneratorError::InvalidRange(
                "colors per image must be at least 1".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Render one image for `base`
    ///
    /// Single is deterministic; Mandala draws its extra palette colors from `rng`.
    pub fn render<R: Rng + ?Sized>(&self, size: ImageSize, base: RgbColor, rng: &mut R) -> RgbImage {
        match *self {
            Pattern::Single => render_single(size, base),
            Pattern::Mandala { colors_per_image } => {
                let palette = mandala_palette(base, colors_per_image, rng);
                render_mandala(size, &palette)
            }
        }
    }
}

/// Uniform fill
pub fn render_single(size: ImageSize, color: RgbColor) -> RgbImage {
    RgbImage::from_pixel(size.width, size.height, Rgb(color.to_array()))
}

/// `[base] + (colors_per_image - 1)` uniformly random colors
pub fn mandala_palette<R: Rng + ?Sized>(base: RgbColor, colors_per_image: u32, rng: &mut R) -> Vec<RgbColor> {
    let extra = colors_per_image.saturating_sub(1) as usize;
    let mut palette = Vec::with_capacity(extra + 1);
    palette.push(base);
    palette.extend((0..extra).map(|_| RgbColor::new(rng.gen(), rng.gen(), rng.gen())));
    palette
}

/// Concentric rings around the image center
///
/// At distance `d` from the center the pixel blends palette entry
/// `floor(d) mod n` into the next one by the fractional part of `d`.
/// Channels are truncated, not rounded.
pub fn render_mandala(size: ImageSize, palette: &[RgbColor]) -> RgbImage {
    if palette.is_empty() {
        return RgbImage::new(size.width, size.height);
    }

    let n = palette.len();
    let center_x = (size.width / 2) as f64;
    let center_y = (size.height / 2) as f64;

    RgbImage::from_fn(size.width, size.height, |x, y| {
        let dx = x as f64 - center_x;
        let dy = y as f64 - center_y;
        let distance = (dx * dx + dy * dy).sqrt();

        let idx = distance as usize % n;
        let next = palette[(idx + 1) % n].to_array();
        let current = palette[idx].to_array();
        let blend = distance % 1.0;

        let channel = |c: usize| (current[c] as f64 * (1.0 - blend) + next[c] as f64 * blend) as u8;
        Rgb([channel(0), channel(1), channel(2)])
    })
}
