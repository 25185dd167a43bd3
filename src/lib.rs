//! Enumerates the 24-bit RGB color space into one small PNG per color.
//!
//! The engine plans an index range into batches, renders each color on a
//! bounded worker pool, skips colors whose file already exists, and reports
//! progress and ETA to an observer. Runs stop cooperatively.

pub mod backend;
pub mod color;
pub mod error;
pub mod generate;
pub mod logging;
pub mod memory;
pub mod state;

pub use error::{GeneratorError, Result};
pub use generate::{GenerationEngine, ProgressSnapshot, RunStatus, RunSummary};
pub use state::options::EngineOptions;
pub use state::request::GenerationRequest;
