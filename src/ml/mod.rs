//! Classifier training, evaluation and persistence.

pub mod metrics;
pub mod mlp;
