//! Recorded landmark collections and training dataset assembly.
//!
//! Collections are persisted one letter per `dataset_<LABEL>.json` file. The
//! builder merges them, derives the sorted [`LabelSet`], shuffles and splits
//! into train/validation partitions with one-hot targets.

use std::path::PathBuf;

use thiserror::Error;

mod builder;
mod collection;
mod label_set;

pub use builder::{
    BuildOptions, DEFAULT_TRAIN_FRACTION, Partition, SplitDataset, build_dataset,
    build_dataset_with_rng, train_count,
};
pub use collection::{
    LabeledSample, LetterCollection, check_label, collection_file_name, decode_collections,
    encode_collection, is_collection_file, list_collection_files, load_collection,
    load_collections, save_collection,
};
pub use label_set::LabelSet;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid dataset json at {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("dataset contains no samples")]
    Empty,
    #[error("training needs at least 2 distinct letters, found {found}")]
    InsufficientClasses { found: usize },
    #[error("sample for {label} has {actual} features, expected {expected}")]
    FeatureLengthMismatch {
        label: String,
        expected: usize,
        actual: usize,
    },
    #[error("label {0} missing from label set")]
    UnknownLabel(String),
    #[error("label {0:?} cannot be used in a file name")]
    InvalidLabel(String),
}
