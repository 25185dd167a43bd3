/// State management module
///
/// This module handles all run configuration, including:
/// - The immutable description of what to generate (request.rs)
/// - Engine tuning knobs: workers, batch size, failure policy (options.rs)
/// - Settings and job files saved as JSON (settings.rs)

pub mod options;
pub mod request;
pub mod settings;
