/// Compute backends for batch color decoding
///
/// A backend turns a contiguous index range into color triples. The scalar
/// backend is always available; the vectorized backend decodes a whole batch
/// into planar channel buffers in parallel, the CPU counterpart of a tensor
/// decode. Every backend must produce exactly the same colors.
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::{self, RgbColor};

/// Backend selection stored in engine options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Pick the best backend available on this machine
    #[default]
    Auto,
    Scalar,
    Vectorized,
}

/// Capability set the engine needs from a compute backend
pub trait ComputeBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Decode `start..=end` in ascending order
    fn decode_range(&self, start: u32, end: u32) -> Vec<RgbColor>;

    /// Free accelerator memory in MB, `None` when the backend runs on the host
    fn accelerator_free_mb(&self) -> Option<u64> {
        None
    }

    /// Called once after each batch, however it ended, so device caches can be released
    fn release_batch(&self) {}
}

/// One color at a time
#[derive(Debug, Default, Clone, Copy)]
pub struct ScalarBackend;

impl ComputeBackend for ScalarBackend {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn decode_range(&self, start: u32, end: u32) -> Vec<RgbColor> {
        (start..=end).map(color::decode_unchecked).collect()
    }
}

/// Planar decode: one pass per channel over the whole batch
#[derive(Debug, Default, Clone, Copy)]
pub struct VectorizedBackend;

/// Below this many indices the planar split costs more than it saves
const VECTORIZE_MIN_LEN: usize = 4096;

impl ComputeBackend for VectorizedBackend {
    fn name(&self) -> &'static str {
        "vectorized"
    }

    fn decode_range(&self, start: u32, end: u32) -> Vec<RgbColor> {
        let len = (end - start) as usize + 1;
        if len < VECTORIZE_MIN_LEN {
            return ScalarBackend.decode_range(start, end);
        }

        let indices: Vec<u32> = (start..=end).collect();
        let plane = |shift: u32| -> Vec<u8> {
            indices.par_iter().map(|&i| ((i >> shift) & 0xFF) as u8).collect()
        };
        let (r, (g, b)) = rayon::join(|| plane(0), || rayon::join(|| plane(8), || plane(16)));

        r.into_iter()
            .zip(g)
            .zip(b)
            .map(|((r, g), b)| RgbColor::new(r, g, b))
            .collect()
    }
}

/// Build the backend for a configured kind
pub fn select_backend(kind: BackendKind) -> Box<dyn ComputeBackend> {
    match kind {
        BackendKind::Scalar => Box::new(ScalarBackend),
        BackendKind::Vectorized => Box::new(VectorizedBackend),
        BackendKind::Auto => {
            // No device runtime is linked in; the host has more than one core to
            // spread the planar passes over, so prefer it there
            let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
            if cores > 1 {
                Box::new(VectorizedBackend)
            } else {
                Box::new(ScalarBackend)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backends_agree() {
        let ranges = [(0, 0), (250, 260), (65_000, 80_000), (16_770_000, 16_777_215)];
        for (start, end) in ranges {
            let scalar = ScalarBackend.decode_range(start, end);
            let vectorized = VectorizedBackend.decode_range(start, end);
            assert_eq!(scalar, vectorized, "range {}..={}", start, end);
            assert_eq!(scalar.len(), (end - start) as usize + 1);
        }
    }

    #[test]
    fn test_decode_range_is_ascending() {
        let colors = ScalarBackend.decode_range(254, 257);
        let indices: Vec<u32> = colors.iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![254, 255, 256, 257]);
    }

    #[test]
    fn test_host_backends_report_no_accelerator() {
        assert_eq!(ScalarBackend.accelerator_free_mb(), None);
        assert_eq!(select_backend(BackendKind::Auto).accelerator_free_mb(), None);
        assert_eq!(select_backend(BackendKind::Scalar).name(), "scalar");
        assert_eq!(select_backend(BackendKind::Vectorized).name(), "vectorized");
    }
}
