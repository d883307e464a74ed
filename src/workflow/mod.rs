//! Per-frame operations and background jobs the UI drives.
//!
//! Nothing in here loops on its own: an external scheduler calls
//! [`process_frame`], [`CollectionFlow::tick`] or [`ChallengeFlow::tick`] once
//! per camera frame, and polls [`TrainingJob`] for events.

mod challenge;
mod collection;
mod live;
mod training;

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::dataset::DatasetError;
use crate::detector::{DetectorError, DetectorLease, Flow, HandDetector};
use crate::inference::InferenceError;
use crate::landmarks::Hand;
use crate::ml::mlp::{ArtifactError, TrainError};
use crate::session::SessionError;

pub use challenge::{ChallengeFlow, ChallengeStatus};
pub use collection::{CollectionFlow, CollectionTick};
pub use live::{FrameOutcome, process_frame};
pub use training::{TrainingEvent, TrainingJob, TrainingRequest, train_from_collections};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Fail unless `lease` was taken for `expected`.
fn require_flow<D>(lease: &DetectorLease<'_, D>, expected: Flow) -> Result<(), DetectorError> {
    let actual = lease.flow();
    if actual == expected {
        Ok(())
    } else {
        Err(DetectorError::WrongFlow { expected, actual })
    }
}

/// Run the leased detector on one frame, treating a failed call as a frame
/// without hands.
pub fn detect_hands<D: HandDetector>(
    lease: &mut DetectorLease<'_, D>,
    frame: &D::Frame,
    timestamp: Duration,
) -> Vec<Hand> {
    match lease.detect(frame, timestamp) {
        Ok(hands) => hands,
        Err(err) => {
            debug!(flow = %lease.flow(), "Frame skipped: {err}");
            Vec::new()
        }
    }
}
