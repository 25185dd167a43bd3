/// Color-space image generation
///
/// This module handles:
/// - Partitioning an index range into batches (planner.rs)
/// - Rendering one image per color (pattern.rs)
/// - Naming output files; the name is the resume key (naming.rs)
/// - Counting, rate and ETA reporting (progress.rs)
/// - Running batches on a worker pool (engine.rs)
/// - Counting what is already on disk (inventory.rs)

pub mod engine;
pub mod inventory;
pub mod naming;
pub mod pattern;
pub mod planner;
pub mod progress;

pub use engine::{EngineState, GenerationEngine, RunStatus, RunSummary};
pub use progress::{format_duration, ProgressCallback, ProgressSnapshot};
