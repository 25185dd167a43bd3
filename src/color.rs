/// Color index codec
///
/// This module maps between a color index and its RGB triple:
/// - Index layout: red is the low byte, green the middle byte, blue the high byte
/// - Luminance uses the Rec. 601 weights (legacy grayscale buckets)
/// - Hex helpers produce the names used on disk
use serde::{Deserialize, Serialize};

use crate::error::{GeneratorError, Result};

/// Highest valid color index (24-bit RGB space)
pub const MAX_INDEX: u32 = 0xFF_FF_FF;

/// Number of colors in the RGB space
pub const COLOR_COUNT: u64 = MAX_INDEX as u64 + 1;

/// Rec. 601 luma weights [R, G, B] in thousandths, so truncation stays exact
const LUMA_WEIGHTS: [u32; 3] = [299, 587, 114];

/// An 8-bit RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Gray triple with all channels set to `value`
    pub const fn gray(value: u8) -> Self {
        Self::new(value, value, value)
    }

    /// Reassemble the color index this triple was decoded from
    pub fn index(self) -> u32 {
        self.r as u32 | (self.g as u32) << 8 | (self.b as u32) << 16
    }

    /// Uppercase `RRGGBB`
    pub fn hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Perceived brightness of this color (see [`luminance`])
    pub fn luminance(self) -> u8 {
        luminance(self.r, self.g, self.b)
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Decode a color index into its RGB triple
///
/// `r = idx mod 256`, `g = (idx / 256) mod 256`, `b = (idx / 65536) mod 256`.
/// Fails with `IndexOutOfRange` outside `0..=16777215`.
pub fn decode(index: u64) -> Result<RgbColor> {
    if index > MAX_INDEX as u64 {
        return Err(GeneratorError::IndexOutOfRange(index));
    }
    Ok(decode_unchecked(index as u32))
}

/// Decode without the domain check (callers have already validated the range)
#[inline]
pub fn decode_unchecked(index: u32) -> RgbColor {
    RgbColor::new(
        (index & 0xFF) as u8,
        ((index >> 8) & 0xFF) as u8,
        ((index >> 16) & 0xFF) as u8,
    )
}

/// Luminance `0.299r + 0.587g + 0.114b`, truncated toward zero and clamped to 0..=255
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let value = LUMA_WEIGHTS[0] * r as u32 + LUMA_WEIGHTS[1] * g as u32 + LUMA_WEIGHTS[2] * b as u32;
    (value / 1000).min(255) as u8
}
