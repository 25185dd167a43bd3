/// Front-end widgets
///
/// - Progress panel: counts, rate, elapsed and remaining time (progress.rs)
/// - Pattern preview for the first color of the range (preview.rs)

pub mod preview;
pub mod progress;
