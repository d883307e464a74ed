//! Hand landmarks and their flattened feature representation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Points reported per hand by the MediaPipe hand landmarker.
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Coordinates stored per landmark point.
pub const COORDS_PER_POINT: usize = 3;

/// Feature vector length for a full MediaPipe hand.
pub const FEATURE_LEN: usize = HAND_LANDMARK_COUNT * COORDS_PER_POINT;

/// A detector-reported hand point in normalized camera space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl LandmarkPoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// One detected hand: landmark points in the detector's stable order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Hand {
    pub points: Vec<LandmarkPoint>,
}

impl Hand {
    pub fn new(points: Vec<LandmarkPoint>) -> Self {
        Self { points }
    }
}

impl From<Vec<LandmarkPoint>> for Hand {
    fn from(points: Vec<LandmarkPoint>) -> Self {
        Self { points }
    }
}

/// Flattened `x, y, z` values of a single hand, point-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl AsRef<[f32]> for FeatureVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// Frame-level normalization failures. Never fatal; the frame is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LandmarkError {
    #[error("no hand detected in frame")]
    NoDetection,
}

/// Flatten one hand into `[x0, y0, z0, x1, y1, z1, ...]`.
pub fn flatten_hand(hand: &Hand) -> FeatureVector {
    let mut values = Vec::with_capacity(hand.points.len() * COORDS_PER_POINT);
    for point in &hand.points {
        values.extend_from_slice(&[point.x, point.y, point.z]);
    }
    FeatureVector(values)
}

/// Turn a detector result into a feature vector using the first hand only.
///
/// Returns [`LandmarkError::NoDetection`] for an empty result or an empty
/// hand rather than a zero vector.
pub fn normalize_detection(hands: &[Hand]) -> Result<FeatureVector, LandmarkError> {
    match hands.first() {
        Some(hand) if !hand.points.is_empty() => Ok(flatten_hand(hand)),
        _ => Err(LandmarkError::NoDetection),
    }
}

#[cfg(test)]
pub(crate) fn synthetic_hand(seed: f32) -> Hand {
    let points = (0..HAND_LANDMARK_COUNT)
        .map(|idx| {
            let t = idx as f32 / HAND_LANDMARK_COUNT as f32;
            LandmarkPoint::new(seed + t, seed * 0.5 + t * t, -t * 0.1)
        })
        .collect();
    Hand::new(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_point_major() {
        let hand = Hand::new(vec![
            LandmarkPoint::new(0.1, 0.2, 0.3),
            LandmarkPoint::new(0.4, 0.5, 0.6),
        ]);
        let features = normalize_detection(&[hand]).unwrap();
        assert_eq!(features.as_slice(), &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn length_is_three_per_point() {
        for count in [1usize, 5, HAND_LANDMARK_COUNT] {
            let hand = Hand::new(vec![LandmarkPoint::default(); count]);
            assert_eq!(flatten_hand(&hand).len(), count * COORDS_PER_POINT);
        }
        assert_eq!(flatten_hand(&synthetic_hand(0.2)).len(), FEATURE_LEN);
    }

    #[test]
    fn only_first_hand_is_used() {
        let first = synthetic_hand(0.1);
        let second = synthetic_hand(0.9);
        let features = normalize_detection(&[first.clone(), second]).unwrap();
        assert_eq!(features, flatten_hand(&first));
    }

    #[test]
    fn empty_detection_is_not_a_zero_vector() {
        assert_eq!(normalize_detection(&[]), Err(LandmarkError::NoDetection));
        assert_eq!(
            normalize_detection(&[Hand::default()]),
            Err(LandmarkError::NoDetection)
        );
    }
}
