/// Batch planning
///
/// Splits an inclusive index range into contiguous batches so the worker
/// pool schedules ranges, not single images.
use crate::error::{GeneratorError, Result};

/// One contiguous, inclusive sub-range of indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchDescriptor {
    pub batch_index: usize,
    pub start_idx: u32,
    pub end_idx: u32,
}

impl BatchDescriptor {
    /// Number of indices in the batch, never zero
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        (self.end_idx - self.start_idx) as u64 + 1
    }
}

/// Partition `start..=end` into batches of at most `batch_size` indices
///
/// Batches are ordered by start index and cover the range exactly once;
/// only the last one may be short.
pub fn plan(start: u32, end: u32, batch_size: u64) -> Result<Vec<BatchDescriptor>> {
    if start > end {
        return Err(GeneratorError::InvalidRange(format!(
            "range start {} is after end {}",
            start, end
        )));
    }
    if batch_size == 0 {
        return Err(GeneratorError::InvalidRange("batch size must be positive".into()));
    }

    let mut batches = Vec::new();
    let mut batch_start = start as u64;
    let end = end as u64;

    while batch_start <= end {
        let batch_end = batch_start.saturating_add(batch_size - 1).min(end);
        batches.push(BatchDescriptor {
            batch_index: batches.len(),
            start_idx: batch_start as u32,
            end_idx: batch_end as u32,
        });
        batch_start = batch_end + 1;
    }

    Ok(batches)
}
