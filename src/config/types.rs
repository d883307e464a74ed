use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::defaults::*;
use crate::app_dirs;
use crate::dataset::BuildOptions;
use crate::ml::mlp::{AdamConfig, TrainOptions};
use crate::session::{ChallengePolicy, SessionTiming};

/// Errors that may occur while loading or saving recognizer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    /// No usable config directory found.
    #[error("No suitable config directory found")]
    NoConfigDir,
}

impl From<app_dirs::AppDirError> for ConfigError {
    fn from(error: app_dirs::AppDirError) -> Self {
        match error {
            app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
            app_dirs::AppDirError::CreateDir { path, source } => {
                ConfigError::CreateDir { path, source }
            }
        }
    }
}

/// Everything persisted in `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RecognizerSettings {
    #[serde(default)]
    pub recording: RecordingSettings,
    #[serde(default)]
    pub challenge: ChallengeSettings,
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub models: ModelSettings,
    #[serde(default)]
    pub datasets: DatasetSettings,
}

impl RecognizerSettings {
    /// Clamp values that would stall or break a session or training run.
    pub fn normalized(mut self) -> Self {
        let recording = &mut self.recording;
        recording.collection_interval_ms = recording.collection_interval_ms.max(MIN_INTERVAL_MS);
        self.challenge.pass_ratio = clamp_unit(self.challenge.pass_ratio, default_pass_ratio());
        let training = &mut self.training;
        training.epochs = training.epochs.max(1);
        training.batch_size = training.batch_size.max(1);
        training.train_fraction = clamp_unit(training.train_fraction, default_train_fraction());
        if !(training.learning_rate.is_finite() && training.learning_rate > 0.0) {
            training.learning_rate = default_learning_rate();
        }
        self
    }
}

/// Session timings, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSettings {
    #[serde(default = "default_collection_duration_ms")]
    pub collection_duration_ms: u64,
    #[serde(default = "default_collection_interval_ms")]
    pub collection_interval_ms: u64,
    #[serde(default = "default_challenge_duration_ms")]
    pub challenge_duration_ms: u64,
    /// How long a challenge verdict stays on screen.
    #[serde(default = "default_result_hold_ms")]
    pub result_hold_ms: u64,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            collection_duration_ms: default_collection_duration_ms(),
            collection_interval_ms: default_collection_interval_ms(),
            challenge_duration_ms: default_challenge_duration_ms(),
            result_hold_ms: default_result_hold_ms(),
        }
    }
}

impl RecordingSettings {
    pub fn collection_timing(&self) -> SessionTiming {
        SessionTiming {
            duration: Duration::from_millis(self.collection_duration_ms),
            sample_interval: Some(Duration::from_millis(self.collection_interval_ms)),
        }
    }

    pub fn challenge_timing(&self) -> SessionTiming {
        SessionTiming {
            duration: Duration::from_millis(self.challenge_duration_ms),
            sample_interval: None,
        }
    }

    pub fn result_hold(&self) -> Duration {
        Duration::from_millis(self.result_hold_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSettings {
    #[serde(default = "default_min_predictions")]
    pub min_predictions: usize,
    #[serde(default = "default_pass_ratio")]
    pub pass_ratio: f32,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            min_predictions: default_min_predictions(),
            pass_ratio: default_pass_ratio(),
        }
    }
}

impl ChallengeSettings {
    pub fn policy(&self) -> ChallengePolicy {
        ChallengePolicy {
            min_predictions: self.min_predictions,
            pass_ratio: self.pass_ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSettings {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_train_fraction")]
    pub train_fraction: f32,
    /// Fixed seed for shuffling and initialization; unset draws fresh entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            train_fraction: default_train_fraction(),
            seed: None,
        }
    }
}

impl TrainingSettings {
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            train_fraction: self.train_fraction,
            seed: self.seed,
        }
    }

    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            epochs: self.epochs,
            batch_size: self.batch_size,
            optimizer: AdamConfig {
                learning_rate: self.learning_rate,
                ..AdamConfig::default()
            },
            seed: self.seed,
            ..TrainOptions::default()
        }
    }
}

/// Where the trained model and label list are read from and written to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Unset uses the `models` folder under the app root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_model_file")]
    pub model_file: String,
    #[serde(default = "default_labels_file")]
    pub labels_file: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            dir: None,
            model_file: default_model_file(),
            labels_file: default_labels_file(),
        }
    }
}

impl ModelSettings {
    pub fn resolve_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(app_dirs::models_dir()?),
        }
    }

    pub fn model_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.model_file)
    }

    pub fn labels_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.labels_file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DatasetSettings {
    /// Unset uses the `datasets` folder under the app root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl DatasetSettings {
    pub fn resolve_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(app_dirs::datasets_dir()?),
        }
    }
}
