/// Error taxonomy for the generator
///
/// Validation errors are returned before a run starts. Everything that goes
/// wrong while a run is in flight ends the run in the `Failed` status and is
/// reported through the run summary instead.
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, GeneratorError>;

#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Malformed index range, image size, palette size or batch size
    #[error("invalid request: {0}")]
    InvalidRange(String),

    /// Color index outside the 24-bit RGB space
    #[error("color index {0} is outside 0..=16777215")]
    IndexOutOfRange(u64),

    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// `run` was called on an engine that already left Idle
    #[error("this engine has already been used; create a new one for another run")]
    EngineSpent,

    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_paths() {
        let err = GeneratorError::Write {
            path: PathBuf::from("/out/RGB_Colors/Single/1x1/000000.png"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        let message = err.to_string();
        assert!(message.contains("000000.png"));
        assert!(message.contains("disk full"));
    }
}
