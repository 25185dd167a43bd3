/// What a generation run produces
///
/// A request is built by the front end (or read from a job file) and never
/// changes once the run starts.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::color::MAX_INDEX;
use crate::error::{GeneratorError, Result};
use crate::generate::naming::{Layout, OutputLayout};
use crate::generate::pattern::{ImageSize, Pattern};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Folder the output tree is created under
    pub output_root: PathBuf,
    /// First color index (inclusive)
    pub start: u32,
    /// Last color index (inclusive)
    pub end: u32,
    #[serde(default)]
    pub size: ImageSize,
    #[serde(default)]
    pub pattern: Pattern,
    #[serde(default)]
    pub layout: Layout,
}

impl Default for GenerationRequest {
    /// The whole RGB space as 1x1 flat images under the user's pictures folder
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            start: 0,
            end: MAX_INDEX,
            size: ImageSize::default(),
            pattern: Pattern::default(),
            layout: Layout::default(),
        }
    }
}

impl GenerationRequest {
    /// Reject anything that would stop the run before it starts
    pub fn validate(&self) -> Result<()> {
        if self.output_root.as_os_str().is_empty() {
            return Err(GeneratorError::InvalidRange("output folder is empty".into()));
        }
        if self.start > self.end {
            return Err(GeneratorError::InvalidRange(format!(
                "range start {} is after end {}",
                self.start, self.end
            )));
        }
        if self.end > MAX_INDEX {
            return Err(GeneratorError::IndexOutOfRange(self.end as u64));
        }
        self.size.validate()?;
        self.pattern.validate()?;
        self.layout.validate()
    }

    /// Number of color indices in the range
    pub fn index_count(&self) -> u64 {
        if self.start > self.end {
            return 0;
        }
        (self.end - self.start) as u64 + 1
    }

    /// Number of images the run accounts for (indices x buckets)
    pub fn total_images(&self) -> u64 {
        self.index_count() * self.layout.buckets().len() as u64
    }

    pub fn output_layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_root, self.pattern, self.size, self.layout)
    }
}

/// `<pictures>/rgb-generator`, falling back to the home directory
pub fn default_output_root() -> PathBuf {
    let mut path = dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_default();
    path.push("rgb-generator");
    path
}
