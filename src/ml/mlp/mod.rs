//! Feed-forward letter classifier: 64 ReLU, 32 ReLU, softmax over letters.

mod adam;
pub mod artifact;
mod model;
mod train;

pub use adam::{Adam, AdamConfig};
pub use artifact::{
    ArtifactError, LABELS_FILE_NAME, MODEL_FILE_NAME, SavedArtifact, WEIGHTS_FILE_NAME,
    load_trained, save_trained,
};
pub use model::{Activation, DEFAULT_HIDDEN_LAYERS, DenseLayer, MlpClassifier, ModelError, argmax};
pub use train::{
    EpochProgress, TrainError, TrainOptions, TrainOutcome, TrainingReport, evaluate,
    train_classifier,
};
