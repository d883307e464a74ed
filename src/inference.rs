//! Letter prediction from feature vectors.
//!
//! A [`TrainedClassifier`] is the only way to pair a model with labels, and
//! it refuses pairs whose output width differs from the label count. The
//! [`ClassifierHandle`] lets the live loop keep predicting while a training
//! run swaps in a new pair.

use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::dataset::LabelSet;
use crate::landmarks::FeatureVector;
use crate::ml::mlp::{ArtifactError, MlpClassifier, argmax, load_trained};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("feature vector has {actual} values, model expects {expected}")]
    FeatureDimensionMismatch { expected: usize, actual: usize },
    #[error("model has {outputs} outputs but {labels} labels")]
    LabelCountMismatch { outputs: usize, labels: usize },
    #[error("no classifier loaded")]
    NoModel,
}

/// Most probable letter for one feature vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

/// A model together with the exact label set it was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedClassifier {
    model: MlpClassifier,
    labels: LabelSet,
}

impl TrainedClassifier {
    pub fn new(model: MlpClassifier, labels: LabelSet) -> Result<Self, InferenceError> {
        if model.output_dim() != labels.len() {
            return Err(InferenceError::LabelCountMismatch {
                outputs: model.output_dim(),
                labels: labels.len(),
            });
        }
        Ok(Self { model, labels })
    }

    pub fn model(&self) -> &MlpClassifier {
        &self.model
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn input_dim(&self) -> usize {
        self.model.input_dim()
    }

    /// Full probability distribution over the label set.
    pub fn probabilities(&self, features: &FeatureVector) -> Result<Vec<f32>, InferenceError> {
        self.model
            .predict_proba(features.as_slice())
            .ok_or(InferenceError::FeatureDimensionMismatch {
                expected: self.model.input_dim(),
                actual: features.len(),
            })
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, InferenceError> {
        let probs = self.probabilities(features)?;
        let (index, confidence) = argmax(&probs).ok_or(InferenceError::NoModel)?;
        let label = self
            .labels
            .get(index)
            .ok_or(InferenceError::LabelCountMismatch {
                outputs: probs.len(),
                labels: self.labels.len(),
            })?;
        Ok(Prediction {
            label: label.to_string(),
            confidence,
        })
    }
}

/// Shared, atomically swappable slot for the active classifier.
#[derive(Debug, Clone, Default)]
pub struct ClassifierHandle {
    current: Arc<RwLock<Option<Arc<TrainedClassifier>>>>,
}

impl ClassifierHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active classifier; readers see the old or new pair, never a mix.
    pub fn install(&self, classifier: TrainedClassifier) {
        let labels = classifier.labels().len();
        let next = Some(Arc::new(classifier));
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        info!(labels, "Classifier installed");
    }

    pub fn clear(&self) {
        match self.current.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    pub fn snapshot(&self) -> Option<Arc<TrainedClassifier>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_some()
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, InferenceError> {
        let classifier = self.snapshot().ok_or(InferenceError::NoModel)?;
        classifier.predict(features)
    }

    /// Load the persisted classifier and install it.
    ///
    /// On failure the handle keeps whatever it held before and the error is
    /// logged; there is no retry.
    pub fn load_from(&self, model_path: &Path, labels_path: &Path) -> Result<(), ArtifactError> {
        match load_trained(model_path, labels_path) {
            Ok(classifier) => {
                self.install(classifier);
                Ok(())
            }
            Err(err) => {
                warn!(path = %model_path.display(), "Failed to load classifier: {err}");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::mlp::{Activation, DenseLayer};

    /// Two inputs, two letters: picks "A" when x0 > x1.
    fn comparator() -> TrainedClassifier {
        let layer = DenseLayer {
            input_dim: 2,
            units: 2,
            activation: Activation::Softmax,
            weights: vec![4.0, -4.0, -4.0, 4.0],
            bias: vec![0.0, 0.0],
        };
        let model = MlpClassifier::new(vec![layer]).unwrap();
        TrainedClassifier::new(model, LabelSet::from_labels(["A", "B"])).unwrap()
    }

    #[test]
    fn predicts_argmax_label_with_confidence() {
        let classifier = comparator();
        let prediction = classifier.predict(&FeatureVector::new(vec![1.0, 0.0])).unwrap();
        assert_eq!(prediction.label, "A");
        assert!(prediction.confidence > 0.99);
        let prediction = classifier.predict(&FeatureVector::new(vec![0.0, 1.0])).unwrap();
        assert_eq!(prediction.label, "B");
    }

    #[test]
    fn repeated_calls_are_identical() {
        let classifier = comparator();
        let input = FeatureVector::new(vec![0.3, 0.7]);
        assert_eq!(
            classifier.predict(&input).unwrap(),
            classifier.predict(&input).unwrap()
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = comparator()
            .predict(&FeatureVector::new(vec![1.0, 0.0, 0.0]))
            .unwrap_err();
        assert_eq!(
            err,
            InferenceError::FeatureDimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn mismatched_pairing_cannot_be_built() {
        let model = comparator().model().clone();
        let labels = LabelSet::from_labels(["A", "B", "C"]);
        let err = TrainedClassifier::new(model, labels).unwrap_err();
        assert_eq!(err, InferenceError::LabelCountMismatch { outputs: 2, labels: 3 });
    }

    #[test]
    fn handle_swaps_whole_pairs() {
        let handle = ClassifierHandle::new();
        let input = FeatureVector::new(vec![1.0, 0.0]);
        assert_eq!(handle.predict(&input), Err(InferenceError::NoModel));

        handle.install(comparator());
        let before = handle.snapshot().unwrap();
        assert_eq!(handle.predict(&input).unwrap().label, "A");

        let layer = DenseLayer {
            input_dim: 2,
            units: 2,
            activation: Activation::Softmax,
            weights: vec![4.0, -4.0, -4.0, 4.0],
            bias: vec![0.0, 0.0],
        };
        let renamed = TrainedClassifier::new(
            MlpClassifier::new(vec![layer]).unwrap(),
            LabelSet::from_labels(["X", "Y"]),
        )
        .unwrap();
        handle.install(renamed);
        assert_eq!(handle.predict(&input).unwrap().label, "X");
        assert_eq!(before.predict(&input).unwrap().label, "A");
    }
}
