/// Saved generator configuration
///
/// One JSON shape serves two purposes:
/// - the front end remembers the last request and options between sessions
/// - headless runs read a job file with the same layout
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::options::EngineOptions;
use super::request::GenerationRequest;
use crate::error::{GeneratorError, Result};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct GeneratorConfig {
    pub request: GenerationRequest,
    #[serde(default)]
    pub options: EngineOptions,
}

impl GeneratorConfig {
    pub fn new(request: GenerationRequest, options: EngineOptions) -> Self {
        Self { request, options }
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read a config from disk
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    /// Write a config to disk, creating the parent directory if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| GeneratorError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, self.to_json()?).map_err(|source| GeneratorError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Last saved front-end settings, or defaults if there are none yet
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable settings");
                Self::default()
            }
        }
    }
}

/// Where the front end keeps its settings
///
/// - Linux: ~/.config/rgb-generator/settings.json
/// - macOS: ~/Library/Application Support/rgb-generator/settings.json
/// - Windows: %APPDATA%\rgb-generator\settings.json
pub fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_default();
    path.push("rgb-generator");
    path.push("settings.json");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::pattern::{ImageSize, Pattern};
    use crate::state::options::FailurePolicy;
    use tempfile::TempDir;

    fn sample() -> GeneratorConfig {
        GeneratorConfig::new(
            GenerationRequest {
                output_root: PathBuf::from("/kaggle/working"),
                start: 0,
                end: 10_000,
                size: ImageSize::new(640, 360),
                pattern: Pattern::Mandala { colors_per_image: 5 },
                ..GenerationRequest::default()
            },
            EngineOptions {
                workers: 4,
                failure_policy: FailurePolicy::SkipAndContinue,
                ..EngineOptions::default()
            },
        )
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let config = sample();
        config.save(&path).unwrap();
        assert_eq!(GeneratorConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = GeneratorConfig::load_or_default(&dir.path().join("absent.json"));
        assert_eq!(config, GeneratorConfig::default());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(GeneratorConfig::load(&path), Err(GeneratorError::Settings(_))));
        assert_eq!(GeneratorConfig::load_or_default(&path), GeneratorConfig::default());
    }

    #[test]
    fn test_job_file_without_options() {
        let config = GeneratorConfig::from_json(
            r#"{"request": {"output_root": "/out", "start": 0, "end": 1}}"#,
        )
        .unwrap();
        assert_eq!(config.options, EngineOptions::default());
        assert_eq!(config.request.total_images(), 2);
    }

    #[test]
    fn test_settings_path_file_name() {
        assert!(settings_path().ends_with("rgb-generator/settings.json"));
    }
}
