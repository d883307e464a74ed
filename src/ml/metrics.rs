//! Evaluation metrics for the letter classifier.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&v| u64::from(v)).sum()
    }
}

/// Precision/recall statistics for a single letter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerClassStats {
    pub label: String,
    /// `TP / (TP + FP)`.
    pub precision: f32,
    /// `TP / (TP + FN)`.
    pub recall: f32,
    pub f1: f32,
    /// Number of true examples for the letter.
    pub support: u32,
}

/// Per-class precision and recall, labelled with `labels[class_idx]`.
pub fn precision_recall_by_class(cm: &ConfusionMatrix, labels: &[String]) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = cm.get(class_idx, class_idx) as f32;
        let mut fp = 0f32;
        let mut fn_ = 0f32;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += v as f32;
                fp += cm.get(j, class_idx) as f32;
            }
        }
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        stats.push(PerClassStats {
            label: labels.get(class_idx).cloned().unwrap_or_default(),
            precision,
            recall,
            f1,
            support,
        });
    }
    stats
}

/// Overall accuracy, or `None` for an empty matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> Option<f32> {
    let total = cm.total();
    if total == 0 {
        return None;
    }
    let correct: u64 = (0..cm.n_classes).map(|c| u64::from(cm.get(c, c))).sum();
    Some(correct as f32 / total as f32)
}

/// Accuracy as a percentage rounded to two decimals.
pub fn accuracy_percent(fraction: f32) -> f32 {
    (fraction * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_class_stats_from_counts() {
        let mut cm = ConfusionMatrix::new(2);
        for _ in 0..3 {
            cm.add(0, 0);
        }
        cm.add(0, 1);
        cm.add(1, 1);
        cm.add(1, 0);
        cm.add(5, 0);

        let labels = vec!["A".to_string(), "B".to_string()];
        let stats = precision_recall_by_class(&cm, &labels);
        assert_eq!(stats[0].label, "A");
        assert_eq!(stats[0].support, 4);
        assert!((stats[0].precision - 0.75).abs() < 1e-6);
        assert!((stats[0].recall - 0.75).abs() < 1e-6);
        assert!((stats[1].precision - 0.5).abs() < 1e-6);
        assert_eq!(accuracy(&cm), Some(4.0 / 6.0));
    }

    #[test]
    fn empty_matrix_has_no_accuracy() {
        assert_eq!(accuracy(&ConfusionMatrix::new(3)), None);
    }

    #[test]
    fn percent_rounds_to_two_decimals() {
        assert_eq!(accuracy_percent(0.912345), 91.23);
        assert_eq!(accuracy_percent(1.0), 100.0);
    }
}
