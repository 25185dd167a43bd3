/// Output file naming
///
/// The resolved path of a unit is its idempotency key: a file at that path
/// means the unit is already done. There is no other manifest.
///
/// Canonical layout:
///   `<root>/RGB_Colors/<Pattern>/<W>x<H>/<RRGGBB>.png`
/// Legacy grayscale-bucket layout:
///   `<root>/<GG>/<GG>-<RRGGBB>-<LLLLLL>.png`
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::pattern::{ImageSize, Pattern};
use crate::color::RgbColor;
use crate::error::{GeneratorError, Result};

/// Top-level folder of the canonical layout
pub const COLORS_FOLDER: &str = "RGB_Colors";

/// Extension of every generated file
pub const IMAGE_EXTENSION: &str = "png";

/// Folder layout of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layout {
    #[default]
    Canonical,
    /// One folder per grayscale bucket; every (bucket, index) pair is a unit
    GrayscaleBuckets { gray_start: u8, gray_end: u8 },
}

impl Layout {
    pub fn validate(&self) -> Result<()> {
        match self {
            Layout::GrayscaleBuckets { gray_start, gray_end } if gray_start > gray_end => {
                Err(GeneratorError::InvalidRange(format!(
                    "grayscale bucket start {} is after end {}",
                    gray_start, gray_end
                )))
            }
            _ => Ok(()),
        }
    }

    /// Buckets to iterate, `[None]` for the canonical layout
    pub fn buckets(&self) -> Vec<Option<u8>> {
        match *self {
            Layout::Canonical => vec![None],
            Layout::GrayscaleBuckets { gray_start, gray_end } => {
                (gray_start..=gray_end).map(Some).collect()
            }
        }
    }
}

/// Resolves directories and file paths for one run
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    pattern_dir: PathBuf,
    layout: Layout,
}

impl OutputLayout {
    pub fn new(output_root: &Path, pattern: Pattern, size: ImageSize, layout: Layout) -> Self {
        let pattern_dir = colors_root(output_root)
            .join(pattern.folder_name())
            .join(size.folder_name());
        Self {
            root: output_root.to_path_buf(),
            pattern_dir,
            layout,
        }
    }

    /// Directory that holds the units of `bucket`
    pub fn dir_for(&self, bucket: Option<u8>) -> PathBuf {
        match (self.layout, bucket) {
            (Layout::GrayscaleBuckets { .. }, Some(gray)) => self.root.join(format!("{:02X}", gray)),
            _ => self.pattern_dir.clone(),
        }
    }

    /// Every directory a run writes into
    pub fn directories(&self) -> Vec<PathBuf> {
        self.layout.buckets().into_iter().map(|b| self.dir_for(b)).collect()
    }

    /// Full path of the unit for `color` in `bucket`
    pub fn path_for(&self, color: RgbColor, bucket: Option<u8>) -> PathBuf {
        self.dir_for(bucket).join(file_name(color, bucket))
    }
}

/// `<root>/RGB_Colors`, without nesting a second `RGB_Colors` if the root already is one
pub fn colors_root(output_root: &Path) -> PathBuf {
    if output_root.file_name().is_some_and(|name| name == COLORS_FOLDER) {
        output_root.to_path_buf()
    } else {
        output_root.join(COLORS_FOLDER)
    }
}

/// File name of a unit: `RRGGBB.png`, or `GG-RRGGBB-LLLLLL.png` inside a gray bucket
pub fn file_name(color: RgbColor, gray_bucket: Option<u8>) -> String {
    match gray_bucket {
        None => format!("{}.{}", color.hex(), IMAGE_EXTENSION),
        Some(gray) => format!(
            "{:02X}-{}-{}.{}",
            gray,
            color.hex(),
            RgbColor::gray(color.luminance()).hex(),
            IMAGE_EXTENSION
        ),
    }
}

/// Path of one unit; a gray bucket selects the legacy layout
pub fn path_for(
    output_root: &Path,
    pattern: Pattern,
    size: ImageSize,
    color: RgbColor,
    legacy_gray_bucket: Option<u8>,
) -> PathBuf {
    match legacy_gray_bucket {
        None => OutputLayout::new(output_root, pattern, size, Layout::Canonical).path_for(color, None),
        Some(gray) => output_root
            .join(format!("{:02X}", gray))
            .join(file_name(color, Some(gray))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_path() {
        let path = path_for(
            Path::new("/out"),
            Pattern::Single,
            ImageSize::new(1, 1),
            RgbColor::new(1, 0, 0),
            None,
        );
        assert_eq!(path, PathBuf::from("/out/RGB_Colors/Single/1x1/010000.png"));
    }

    #[test]
    fn test_mandala_folder() {
        let path = path_for(
            Path::new("/out"),
            Pattern::Mandala { colors_per_image: 5 },
            ImageSize::new(640, 360),
            RgbColor::new(0xFF, 0x80, 0x00),
            None,
        );
        assert_eq!(path, PathBuf::from("/out/RGB_Colors/Mandala/640x360/FF8000.png"));
    }

    #[test]
    fn test_root_already_colors_folder() {
        let layout = OutputLayout::new(
            Path::new("/data/RGB_Colors"),
            Pattern::Single,
            ImageSize::new(2, 2),
            Layout::Canonical,
        );
        assert_eq!(
            layout.path_for(RgbColor::new(0, 0, 0), None),
            PathBuf::from("/data/RGB_Colors/Single/2x2/000000.png")
        );
    }

    #[test]
    fn test_legacy_bucket_path() {
        // Luminance of (255, 0, 0) is 76 = 0x4C
        let path = path_for(
            Path::new("/out"),
            Pattern::Single,
            ImageSize::new(1, 1),
            RgbColor::new(255, 0, 0),
            Some(0x10),
        );
        assert_eq!(path, PathBuf::from("/out/10/10-FF0000-4C4C4C.png"));
    }

    #[test]
    fn test_layout_directories() {
        let layout = OutputLayout::new(
            Path::new("/out"),
            Pattern::Single,
            ImageSize::new(1, 1),
            Layout::GrayscaleBuckets { gray_start: 1, gray_end: 3 },
        );
        assert_eq!(
            layout.directories(),
            vec![
                PathBuf::from("/out/01"),
                PathBuf::from("/out/02"),
                PathBuf::from("/out/03")
            ]
        );
    }

    #[test]
    fn test_bucket_validation() {
        assert!(Layout::GrayscaleBuckets { gray_start: 5, gray_end: 4 }.validate().is_err());
        assert!(Layout::GrayscaleBuckets { gray_start: 4, gray_end: 4 }.validate().is_ok());
        assert_eq!(Layout::Canonical.buckets(), vec![None]);
    }
}
