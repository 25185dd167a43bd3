/// Memory headroom reading and batch sizing
///
/// Batch sizing is a best-effort heuristic: it trades scheduling overhead
/// against how much decoded color data sits in memory at once. It is not a
/// resource guarantee and nothing relies on it for safety.
use sysinfo::System;

use crate::backend::ComputeBackend;

/// Default number of indices per batch
pub const BASE_BATCH_SIZE: u64 = 30_000;

/// Accelerator headroom (MB) above which batches double
const ACCEL_HEADROOM_MB: u64 = 500;

/// Host RAM headroom (MB) above which batches grow by half
const RAM_HEADROOM_MB: u64 = 400;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Memory available to a run, in MB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryBudget {
    pub available_ram_mb: u64,
    pub available_accelerator_mb: u64,
}

impl MemoryBudget {
    /// Batch size for this budget (see [`batch_size`])
    pub fn batch_size(&self, base: u64) -> u64 {
        batch_size(self.available_ram_mb, self.available_accelerator_mb, base)
    }
}

/// Read live host memory and the backend's accelerator headroom
///
/// Never fails: a reading that returns nothing reports zero headroom,
/// which selects the smallest batch size.
pub fn estimate(backend: &dyn ComputeBackend) -> MemoryBudget {
    let mut system = System::new();
    system.refresh_memory();
    let available_bytes = system.available_memory();

    if available_bytes == 0 {
        tracing::warn!("Could not read available host memory, assuming no headroom");
    }

    let budget = MemoryBudget {
        available_ram_mb: available_bytes / BYTES_PER_MB,
        available_accelerator_mb: backend.accelerator_free_mb().unwrap_or(0),
    };
    tracing::debug!(
        ram_mb = budget.available_ram_mb,
        accelerator_mb = budget.available_accelerator_mb,
        "Memory headroom"
    );
    budget
}

/// `base * 2` with more than 500 MB of accelerator headroom, else
/// `base * 1.5` with more than 400 MB of RAM, else `base`
///
/// Saturates at `u64::MAX` instead of overflowing.
pub fn batch_size(available_ram_mb: u64, available_accel_mb: u64, base: u64) -> u64 {
    if available_accel_mb > ACCEL_HEADROOM_MB {
        base.saturating_mul(2)
    } else if available_ram_mb > RAM_HEADROOM_MB {
        base.saturating_add(base / 2)
    } else {
        base
    }
}
