use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::adam::{Adam, AdamConfig, LayerGradients};
use super::model::{Activation, DEFAULT_HIDDEN_LAYERS, ForwardTrace, MlpClassifier, argmax};
use crate::dataset::{Partition, SplitDataset};
use crate::inference::{InferenceError, TrainedClassifier};
use crate::ml::metrics::{
    ConfusionMatrix, PerClassStats, accuracy, accuracy_percent, precision_recall_by_class,
};

/// Probabilities are clipped to `[PROB_EPSILON, 1]` before taking the log.
const PROB_EPSILON: f32 = 1e-7;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub hidden_layers: Vec<usize>,
    pub epochs: usize,
    pub batch_size: usize,
    pub optimizer: AdamConfig,
    /// Reshuffle the training partition every epoch.
    pub shuffle: bool,
    /// Fixed seed for weight init and batch order; `None` uses OS entropy.
    pub seed: Option<u64>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            hidden_layers: DEFAULT_HIDDEN_LAYERS.to_vec(),
            epochs: 50,
            batch_size: 32,
            optimizer: AdamConfig::default(),
            shuffle: true,
            seed: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("training partition is empty")]
    EmptyTrainingSet,
    #[error("training needs at least 2 classes, found {found}")]
    InsufficientClasses { found: usize },
    #[error("training row {row} has {actual} features, expected {expected}")]
    FeatureLength {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Pairing(#[from] InferenceError),
}

/// Metrics emitted after every epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochProgress {
    /// Zero-based epoch index.
    pub epoch: usize,
    pub epochs: usize,
    pub loss: f32,
    pub accuracy: f32,
    /// `None` when the validation partition is empty.
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

impl EpochProgress {
    /// Completed share of the epoch budget in `[0, 100]`.
    pub fn percent_complete(&self) -> f32 {
        if self.epochs == 0 {
            return 100.0;
        }
        (self.epoch + 1) as f32 / self.epochs as f32 * 100.0
    }
}

/// Summary of a finished training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub history: Vec<EpochProgress>,
    /// Final validation accuracy in percent (two decimals); `None` when
    /// there was nothing to validate on.
    pub accuracy_percent: Option<f32>,
    pub confusion: ConfusionMatrix,
    pub per_class: Vec<PerClassStats>,
    pub train_samples: usize,
    pub validation_samples: usize,
}

impl TrainingReport {
    /// Display form of the final accuracy, e.g. `"93.75%"` or `"undefined"`.
    pub fn accuracy_display(&self) -> String {
        match self.accuracy_percent {
            Some(value) => format!("{value:.2}%"),
            None => "undefined".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub classifier: TrainedClassifier,
    pub report: TrainingReport,
}

/// Fit the letter classifier on `dataset` and pair it with its label set.
///
/// `progress` receives one [`EpochProgress`] per epoch.
pub fn train_classifier(
    dataset: &SplitDataset,
    options: &TrainOptions,
    mut progress: Option<&mut dyn FnMut(&EpochProgress)>,
) -> Result<TrainOutcome, TrainError> {
    if dataset.train.is_empty() {
        return Err(TrainError::EmptyTrainingSet);
    }
    let n_classes = dataset.labels.len();
    if n_classes < 2 {
        return Err(TrainError::InsufficientClasses { found: n_classes });
    }
    let d = dataset.feature_len;
    for partition in [&dataset.train, &dataset.validation] {
        if let Some((row, x)) = partition.x.iter().enumerate().find(|(_, x)| x.len() != d) {
            return Err(TrainError::FeatureLength {
                row,
                expected: d,
                actual: x.len(),
            });
        }
    }

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let mut model =
        MlpClassifier::with_architecture(d, &options.hidden_layers, n_classes, &mut rng);
    let mut adam = Adam::new(options.optimizer, &model);
    let mut grads = LayerGradients::zeros_for(&model);
    let mut trace = ForwardTrace::default();
    let mut deltas: Vec<Vec<f32>> = model
        .layers()
        .iter()
        .map(|layer| vec![0.0; layer.units])
        .collect();

    info!(
        train = dataset.train.len(),
        validation = dataset.validation.len(),
        features = d,
        classes = n_classes,
        parameters = model.parameter_count(),
        epochs = options.epochs,
        "Training letter classifier"
    );

    let batch_size = options.batch_size.max(1);
    let mut indices: Vec<usize> = (0..dataset.train.len()).collect();
    let mut history = Vec::with_capacity(options.epochs);

    for epoch in 0..options.epochs {
        if options.shuffle {
            indices.shuffle(&mut rng);
        }
        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;

        for batch in indices.chunks(batch_size) {
            for g in grads.iter_mut() {
                g.reset();
            }
            for &idx in batch {
                let x = &dataset.train.x[idx];
                let y = &dataset.train.y[idx];
                model.forward_trace(x, &mut trace);
                let probs = trace.output();
                loss_sum += f64::from(cross_entropy(probs, y));
                if argmax(probs).map(|(c, _)| c) == Some(dataset.train.classes[idx]) {
                    correct += 1;
                }
                accumulate_gradients(&model, &trace, y, &mut deltas, &mut grads);
            }
            let inv = 1.0 / batch.len() as f32;
            for g in grads.iter_mut() {
                g.scale(inv);
            }
            adam.apply(&mut model, &grads);
        }

        let n = dataset.train.len() as f64;
        let (val_loss, val_accuracy) = match evaluate(&model, &dataset.validation) {
            Some((loss, acc)) => (Some(loss), Some(acc)),
            None => (None, None),
        };
        let update = EpochProgress {
            epoch,
            epochs: options.epochs,
            loss: (loss_sum / n) as f32,
            accuracy: (correct as f64 / n) as f32,
            val_loss,
            val_accuracy,
        };
        debug!(
            epoch = epoch + 1,
            loss = update.loss,
            acc = update.accuracy,
            val_loss = ?update.val_loss,
            val_acc = ?update.val_accuracy,
            "Epoch finished"
        );
        if let Some(callback) = progress.as_mut() {
            callback(&update);
        }
        history.push(update);
    }

    let confusion = confusion_matrix(&model, &dataset.validation, n_classes);
    let accuracy_percent = accuracy(&confusion).map(accuracy_percent);
    let per_class = precision_recall_by_class(&confusion, dataset.labels.as_slice());
    let report = TrainingReport {
        history,
        accuracy_percent,
        confusion,
        per_class,
        train_samples: dataset.train.len(),
        validation_samples: dataset.validation.len(),
    };
    info!(accuracy = %report.accuracy_display(), "Training finished");

    let classifier = TrainedClassifier::new(model, dataset.labels.clone())?;
    Ok(TrainOutcome { classifier, report })
}

/// Mean categorical cross-entropy and accuracy; `None` for an empty partition.
pub fn evaluate(model: &MlpClassifier, partition: &Partition) -> Option<(f32, f32)> {
    if partition.is_empty() {
        return None;
    }
    let mut loss_sum = 0.0f64;
    let mut correct = 0usize;
    for ((x, y), &class_idx) in partition.x.iter().zip(&partition.y).zip(&partition.classes) {
        let Some(probs) = model.predict_proba(x) else {
            continue;
        };
        loss_sum += f64::from(cross_entropy(&probs, y));
        if argmax(&probs).map(|(c, _)| c) == Some(class_idx) {
            correct += 1;
        }
    }
    let n = partition.len() as f64;
    Some(((loss_sum / n) as f32, (correct as f64 / n) as f32))
}

fn confusion_matrix(
    model: &MlpClassifier,
    partition: &Partition,
    n_classes: usize,
) -> ConfusionMatrix {
    let mut cm = ConfusionMatrix::new(n_classes);
    for (x, &truth) in partition.x.iter().zip(&partition.classes) {
        if let Some((predicted, _)) = model.predict_proba(x).as_deref().and_then(argmax) {
            cm.add(truth, predicted);
        }
    }
    cm
}

fn cross_entropy(probs: &[f32], target: &[f32]) -> f32 {
    probs
        .iter()
        .zip(target)
        .filter(|(_, t)| **t > 0.0)
        .map(|(p, t)| -t * p.clamp(PROB_EPSILON, 1.0).ln())
        .sum()
}

/// Backpropagate one sample and add its gradients to `grads`.
fn accumulate_gradients(
    model: &MlpClassifier,
    trace: &ForwardTrace,
    target: &[f32],
    deltas: &mut [Vec<f32>],
    grads: &mut [LayerGradients],
) {
    let layers = model.layers();
    let last = layers.len() - 1;

    // Softmax with cross-entropy: dL/dz = p - y.
    for ((delta, p), t) in deltas[last].iter_mut().zip(trace.output()).zip(target) {
        *delta = p - t;
    }

    for l in (0..layers.len()).rev() {
        let layer = &layers[l];
        let input = &trace.activations[l];
        let (lower, upper) = deltas.split_at_mut(l);
        let delta = &upper[0];
        let grad = &mut grads[l];
        for u in 0..layer.units {
            let du = delta[u];
            if du == 0.0 {
                continue;
            }
            grad.bias[u] += du;
            let row = &mut grad.weights[u * layer.input_dim..(u + 1) * layer.input_dim];
            for (g, &a) in row.iter_mut().zip(input) {
                *g += du * a;
            }
        }
        if l == 0 {
            break;
        }
        let prev = &mut lower[l - 1];
        let prev_pre = &trace.pre_activations[l - 1];
        debug_assert_eq!(layers[l - 1].activation, Activation::Relu);
        for (i, slot) in prev.iter_mut().enumerate() {
            if prev_pre[i] <= 0.0 {
                *slot = 0.0;
                continue;
            }
            let mut sum = 0.0f32;
            for u in 0..layer.units {
                sum += layer.weights[u * layer.input_dim + i] * delta[u];
            }
            *slot = sum;
        }
    }
}
