use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Immutable settings for one detection run.
///
/// Every field has a default, so a config file only needs the keys it
/// overrides; nested sections merge the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfiguration {
    /// Run full face analysis on every Nth frame.
    pub frame_skip: usize,
    /// Maximum embedding distance for a confirmed match.
    pub detection_threshold: f64,
    /// Grayscale standard deviation below which a face counts as masked.
    pub mask_std_threshold: f64,
    pub clip_duration_seconds: f64,
    pub max_reference_images: usize,
    pub paths: PathsConfig,
    pub models: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where matched-face crops are written.
    pub output_folder: PathBuf,
    pub reports: PathBuf,
    /// Where detection clips are written.
    pub temp: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub detector_name: String,
    pub detector_url: String,
    pub embedder_name: String,
    pub embedder_url: String,
    /// Minimum detector score for a face box.
    pub detector_confidence: f64,
    /// The embedding service's own match tolerance, independent of
    /// `detection_threshold`.
    pub match_tolerance: f64,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            frame_skip: 5,
            detection_threshold: 0.5,
            mask_std_threshold: 20.0,
            clip_duration_seconds: 5.0,
            max_reference_images: 4,
            paths: PathsConfig::default(),
            models: ModelConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_folder: PathBuf::from("detected_faces"),
            reports: PathBuf::from("reports"),
            temp: PathBuf::from("temp"),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detector_name: YOLO_MODEL_NAME.to_string(),
            detector_url: YOLO_MODEL_URL.to_string(),
            embedder_name: EMBEDDING_MODEL_NAME.to_string(),
            embedder_url: EMBEDDING_MODEL_URL.to_string(),
            detector_confidence: 0.5,
            match_tolerance: 0.6,
        }
    }
}

impl PathsConfig {
    /// Artifact folders rooted under a task folder.
    pub fn for_task(task_dir: &Path) -> Self {
        Self {
            output_folder: task_dir.join("detected_faces"),
            reports: task_dir.join("reports"),
            temp: task_dir.join("temp"),
        }
    }
}

impl RunConfiguration {
    /// Reads a JSON config file; keys it leaves out keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but falls back to defaults when the file is
    /// missing or unusable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded external configuration from {}", path.display());
                config
            }
            Err(e) => {
                log::error!("Error loading config: {e}");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_skip < 1 {
            return Err(invalid("frame_skip", "must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.detection_threshold) {
            return Err(invalid("detection_threshold", "must be within [0, 1]"));
        }
        if !(self.mask_std_threshold >= 0.0) {
            return Err(invalid("mask_std_threshold", "must be >= 0"));
        }
        if !(self.clip_duration_seconds > 0.0) {
            return Err(invalid("clip_duration_seconds", "must be > 0"));
        }
        if self.max_reference_images < 1 {
            return Err(invalid("max_reference_images", "must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.models.match_tolerance) {
            return Err(invalid("models.match_tolerance", "must be within [0, 1]"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
