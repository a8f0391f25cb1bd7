use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::capture::domain::camera::{CaptureConstraints, FacingMode};
use crate::detection::infrastructure::onnx_face_analyzer::AnalyzerOptions;
use crate::shared::constants::{
    APP_DIR_NAME, DEFAULT_DETECTOR_INPUT_SIZE, DEFAULT_SCORE_THRESHOLD, METADATA_TIMEOUT,
    PREFERRED_HEIGHT, PREFERRED_WIDTH, SETTLE_DELAY, TICK_INTERVAL,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Session settings. Every field is optional in the JSON file; missing
/// fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory searched first for `<model>.onnx` files.
    pub model_dir: Option<PathBuf>,
    /// Base URL models are downloaded from when not found locally.
    pub model_url: Option<String>,
    pub device: Option<String>,
    pub width: u32,
    pub height: u32,
    pub facing: FacingMode,
    pub interval_ms: u64,
    pub settle_delay_ms: u64,
    pub metadata_timeout_ms: u64,
    pub score_threshold: f64,
    pub input_size: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            model_url: None,
            device: None,
            width: PREFERRED_WIDTH,
            height: PREFERRED_HEIGHT,
            facing: FacingMode::User,
            interval_ms: TICK_INTERVAL.as_millis() as u64,
            settle_delay_ms: SETTLE_DELAY.as_millis() as u64,
            metadata_timeout_ms: METADATA_TIMEOUT.as_millis() as u64,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            input_size: DEFAULT_DETECTOR_INPUT_SIZE,
        }
    }
}

impl SessionConfig {
    /// `<config dir>/FaceCam/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads the file at [`Self::default_path`] if one exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_json_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid("interval_ms must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(ConfigError::Invalid(format!(
                "score_threshold must be between 0.0 and 1.0, got {}",
                self.score_threshold
            )));
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(ConfigError::Invalid(format!(
                "input_size must be a positive multiple of 32, got {}",
                self.input_size
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid("width and height must be positive".into()));
        }
        Ok(())
    }

    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            width: self.width,
            height: self.height,
            facing: self.facing,
            audio: false,
            device: self.device.clone(),
        }
    }

    pub fn analyzer_options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            input_size: self.input_size,
            score_threshold: self.score_threshold,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }
}
