/// How a generation run executes
///
/// Options never change what ends up on disk for Single images; they tune
/// parallelism, batching, error handling and mandala randomness.
use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::color::COLOR_COUNT;
use crate::error::{GeneratorError, Result};
use crate::memory::BASE_BATCH_SIZE;

/// What to do when writing one image fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run; it ends as Failed with the write error
    #[default]
    Abort,
    /// Count the unit as failed, log it, keep going
    SkipAndContinue,
}

/// Where mandala palette colors come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MandalaSeed {
    /// Fresh random palette for every image
    #[default]
    Random,
    /// Palette seeded from the color index, identical across runs
    PerIndex,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct EngineOptions {
    /// Worker threads; 0 uses the available CPU parallelism
    pub workers: usize,
    /// Batch size before memory scaling, in 1..=16777216
    pub base_batch_size: u64,
    pub failure_policy: FailurePolicy,
    pub mandala_seed: MandalaSeed,
    pub backend: BackendKind,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            base_batch_size: BASE_BATCH_SIZE,
            failure_policy: FailurePolicy::default(),
            mandala_seed: MandalaSeed::default(),
            backend: BackendKind::default(),
        }
    }
}

impl EngineOptions {
    /// Reject option values no run can use
    ///
    /// A batch never needs to hold more than the whole color space.
    pub fn validate(&self) -> Result<()> {
        if self.base_batch_size == 0 || self.base_batch_size > COLOR_COUNT {
            return Err(GeneratorError::InvalidRange(format!(
                "batch size must be between 1 and {}, got {}",
                COLOR_COUNT, self.base_batch_size
            )));
        }
        Ok(())
    }

    /// Worker count with the CPU default resolved
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}
