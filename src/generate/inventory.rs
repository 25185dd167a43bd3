/// Inventory of files already on disk
///
/// Counts the PNGs a request would skip, which is how far an interrupted
/// run got. Walks the request's output directories only.
use walkdir::WalkDir;

use super::naming::IMAGE_EXTENSION;
use crate::state::request::GenerationRequest;

/// Number of finished images under the request's output directories
///
/// Scratch `.part` files are not counted. Missing directories count as empty.
pub fn count_existing(request: &GenerationRequest) -> u64 {
    request
        .output_layout()
        .directories()
        .iter()
        .filter(|dir| dir.is_dir())
        .map(|dir| {
            WalkDir::new(dir)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| {
                    e.path()
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(IMAGE_EXTENSION))
                })
                .count() as u64
        })
        .sum()
}
