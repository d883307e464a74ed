//! BISINDO hand-sign letter recognition from hand landmarks.
//!
//! Detector output is normalized into feature vectors, recorded per letter,
//! assembled into a dataset, fitted with a small MLP and classified live.

/// Application directory helpers.
pub mod app_dirs;
/// Atomic file replacement.
pub mod atomic_file;
/// Recognizer settings persisted as TOML.
pub mod config;
/// Letter collections and dataset assembly.
pub mod dataset;
/// Hand-landmark detector boundary.
pub mod detector;
/// Live letter prediction.
pub mod inference;
/// Landmark normalization into feature vectors.
pub mod landmarks;
/// Logging initialization.
pub mod logging;
/// Classifier training and persistence.
pub mod ml;
/// Recording sessions and challenge evaluation.
pub mod session;
/// Frame-driven flows and background training.
pub mod workflow;
