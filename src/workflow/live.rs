use std::time::Duration;

use tracing::{debug, warn};

use super::detect_hands;
use crate::detector::{DetectorLease, HandDetector};
use crate::inference::{ClassifierHandle, InferenceError, Prediction};
use crate::landmarks::normalize_detection;

/// Result of pushing one frame through live inference.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Predicted(Prediction),
    /// No hand in the frame, or the detector call failed.
    NoHand,
    /// No classifier is installed yet.
    NoModel,
    /// The classifier rejected the feature vector.
    Rejected,
}

/// Detect, normalize and classify one frame, reporting predictions to
/// `on_prediction`. Every failure is recovered here and the frame skipped.
pub fn process_frame<D: HandDetector>(
    lease: &mut DetectorLease<'_, D>,
    frame: &D::Frame,
    timestamp: Duration,
    classifier: &ClassifierHandle,
    on_prediction: &mut dyn FnMut(&Prediction),
) -> FrameOutcome {
    let hands = detect_hands(lease, frame, timestamp);
    let features = match normalize_detection(&hands) {
        Ok(features) => features,
        Err(_) => return FrameOutcome::NoHand,
    };
    match classifier.predict(&features) {
        Ok(prediction) => {
            on_prediction(&prediction);
            FrameOutcome::Predicted(prediction)
        }
        Err(InferenceError::NoModel) => {
            debug!("Frame not classified: no classifier loaded");
            FrameOutcome::NoModel
        }
        Err(err) => {
            warn!("Frame not classified: {err}");
            FrameOutcome::Rejected
        }
    }
}
