//! Recognizer settings stored as `config.toml` under the app root.

mod defaults;
mod io;
mod types;


/// Default filename used to store the recognizer configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub use io::{config_path, load_from, load_or_default, save, save_to_path};
pub use types::{
    ChallengeSettings, ConfigError, DatasetSettings, ModelSettings, RecognizerSettings,
    RecordingSettings, TrainingSettings,
};
