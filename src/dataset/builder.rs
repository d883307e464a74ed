use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use super::{DatasetError, LabelSet, LabeledSample, LetterCollection};

/// Fraction of shuffled samples assigned to the training partition.
pub const DEFAULT_TRAIN_FRACTION: f32 = 0.8;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub train_fraction: f32,
    /// Fixed shuffle seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            train_fraction: DEFAULT_TRAIN_FRACTION,
            seed: None,
        }
    }
}

/// Features with one-hot targets for one partition.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub x: Vec<Vec<f32>>,
    /// One-hot rows against the label set.
    pub y: Vec<Vec<f32>>,
    /// Class index per row.
    pub classes: Vec<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    fn push(&mut self, features: Vec<f32>, class_idx: usize, one_hot: Vec<f32>) {
        self.x.push(features);
        self.y.push(one_hot);
        self.classes.push(class_idx);
    }
}

/// Shuffled, split and encoded training data.
#[derive(Debug, Clone)]
pub struct SplitDataset {
    pub labels: LabelSet,
    pub feature_len: usize,
    pub train: Partition,
    pub validation: Partition,
}

impl SplitDataset {
    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len()
    }
}

/// `floor(fraction * total)`, clamped to `total`.
pub fn train_count(total: usize, fraction: f32) -> usize {
    let fraction = f64::from(fraction.clamp(0.0, 1.0));
    ((total as f64 * fraction).floor() as usize).min(total)
}

/// Merge collections, derive the label set, shuffle, split and one-hot encode.
pub fn build_dataset(
    collections: &[LetterCollection],
    options: &BuildOptions,
) -> Result<SplitDataset, DatasetError> {
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    build_dataset_with_rng(collections, options.train_fraction, &mut rng)
}

/// [`build_dataset`] with a caller-supplied shuffle source.
pub fn build_dataset_with_rng<R: Rng + ?Sized>(
    collections: &[LetterCollection],
    train_fraction: f32,
    rng: &mut R,
) -> Result<SplitDataset, DatasetError> {
    let mut samples: Vec<LabeledSample> = collections
        .iter()
        .flat_map(|collection| collection.labeled_samples())
        .collect();
    if samples.is_empty() {
        return Err(DatasetError::Empty);
    }

    let labels = LabelSet::from_labels(samples.iter().map(|sample| sample.label.as_str()));
    if labels.len() < 2 {
        return Err(DatasetError::InsufficientClasses {
            found: labels.len(),
        });
    }

    let feature_len = samples[0].features.len();
    if let Some(bad) = samples
        .iter()
        .find(|sample| sample.features.len() != feature_len)
    {
        return Err(DatasetError::FeatureLengthMismatch {
            label: bad.label.clone(),
            expected: feature_len,
            actual: bad.features.len(),
        });
    }

    samples.shuffle(rng);

    let total = samples.len();
    let n_train = train_count(total, train_fraction);
    let n_classes = labels.len();
    let mut train = Partition::default();
    let mut validation = Partition::default();
    for (position, sample) in samples.into_iter().enumerate() {
        let (class_idx, one_hot) = labels
            .one_hot(&sample.label)
            .ok_or_else(|| DatasetError::UnknownLabel(sample.label.clone()))?;
        let target = if position < n_train {
            &mut train
        } else {
            &mut validation
        };
        target.push(sample.features.into_inner(), class_idx, one_hot);
    }

    info!(
        total,
        train = train.len(),
        validation = validation.len(),
        classes = n_classes,
        "Dataset assembled"
    );
    Ok(SplitDataset {
        labels,
        feature_len,
        train,
        validation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::FeatureVector;

    fn collection(label: &str, count: usize, len: usize) -> LetterCollection {
        let samples = (0..count)
            .map(|idx| FeatureVector::new(vec![idx as f32; len]))
            .collect();
        LetterCollection::new(label, samples)
    }

    fn seeded() -> BuildOptions {
        BuildOptions {
            seed: Some(7),
            ..BuildOptions::default()
        }
    }

    #[test]
    fn split_sizes_follow_floor_rule() {
        for (a, b) in [(5usize, 5usize), (3, 4), (1, 1), (17, 4)] {
            let data = build_dataset(&[collection("A", a, 3), collection("B", b, 3)], &seeded())
                .unwrap();
            let total = a + b;
            assert_eq!(data.total(), total);
            assert_eq!(data.train.len(), (total as f64 * 0.8).floor() as usize);
            assert_eq!(data.train.len() + data.validation.len(), total);
        }
    }

    #[test]
    fn label_set_is_sorted_and_unique() {
        let data = build_dataset(
            &[
                collection("C", 2, 3),
                collection("A", 2, 3),
                collection("C", 1, 3),
                collection("B", 2, 3),
            ],
            &seeded(),
        )
        .unwrap();
        assert_eq!(data.labels.as_slice(), &["A", "B", "C"]);
        for (row, &class_idx) in data.train.y.iter().zip(&data.train.classes) {
            assert_eq!(row.len(), 3);
            assert_eq!(row[class_idx], 1.0);
            assert_eq!(row.iter().sum::<f32>(), 1.0);
        }
    }

    #[test]
    fn single_label_is_rejected() {
        let err = build_dataset(&[collection("A", 10, 3), collection("A", 4, 3)], &seeded())
            .unwrap_err();
        assert!(matches!(err, DatasetError::InsufficientClasses { found: 1 }));
    }

    #[test]
    fn mismatched_lengths_never_enter_the_dataset() {
        let err = build_dataset(&[collection("A", 2, 3), collection("B", 2, 4)], &seeded())
            .unwrap_err();
        assert!(matches!(
            err,
            DatasetError::FeatureLengthMismatch { expected: 3, actual: 4, .. }
        ));
    }

    #[test]
    fn shuffle_mixes_labels_across_the_split() {
        let data = build_dataset(&[collection("A", 50, 2), collection("B", 50, 2)], &seeded())
            .unwrap();
        let train_b = data.train.classes.iter().filter(|&&c| c == 1).count();
        assert!(train_b > 0 && train_b < data.train.len());
    }

    #[test]
    fn same_seed_gives_same_split() {
        let input = [collection("A", 6, 2), collection("B", 6, 2)];
        let first = build_dataset(&input, &seeded()).unwrap();
        let second = build_dataset(&input, &seeded()).unwrap();
        assert_eq!(first.train.classes, second.train.classes);
        assert_eq!(first.train.x, second.train.x);
    }
}
