use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::{FrameDisposition, RecordingSession, SessionError, SessionStatus, SessionTiming};
use crate::inference::TrainedClassifier;
use crate::landmarks::Hand;

/// Pass rules for a challenge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChallengePolicy {
    pub min_predictions: usize,
    /// Accuracy must be strictly greater than this.
    pub pass_ratio: f32,
}

impl Default for ChallengePolicy {
    fn default() -> Self {
        Self {
            min_predictions: 5,
            pass_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChallengeFailure {
    /// Too few predictions to judge; an outcome, not an error.
    InsufficientSamples { collected: usize, required: usize },
    BelowThreshold { correct: usize, total: usize, accuracy: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChallengeOutcome {
    Success { correct: usize, total: usize, accuracy: f32 },
    Failure(ChallengeFailure),
}

impl ChallengeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ChallengeOutcome::Success { .. })
    }

    /// Fraction of correct predictions, when enough were collected.
    pub fn accuracy(&self) -> Option<f32> {
        match self {
            ChallengeOutcome::Success { accuracy, .. }
            | ChallengeOutcome::Failure(ChallengeFailure::BelowThreshold { accuracy, .. }) => {
                Some(*accuracy)
            }
            ChallengeOutcome::Failure(ChallengeFailure::InsufficientSamples { .. }) => None,
        }
    }
}

/// Judge a challenge from the predicted labels it collected.
pub fn evaluate_predictions<S: AsRef<str>>(
    target: &str,
    predictions: &[S],
    policy: &ChallengePolicy,
) -> ChallengeOutcome {
    let total = predictions.len();
    if total < policy.min_predictions || total == 0 {
        return ChallengeOutcome::Failure(ChallengeFailure::InsufficientSamples {
            collected: total,
            required: policy.min_predictions,
        });
    }
    let correct = predictions
        .iter()
        .filter(|label| label.as_ref() == target)
        .count();
    let accuracy = correct as f32 / total as f32;
    if accuracy > policy.pass_ratio {
        ChallengeOutcome::Success {
            correct,
            total,
            accuracy,
        }
    } else {
        ChallengeOutcome::Failure(ChallengeFailure::BelowThreshold {
            correct,
            total,
            accuracy,
        })
    }
}

/// A recording session that classifies every sample it keeps.
///
/// The classifier is captured when the session is created so one challenge
/// never mixes predictions from two models.
#[derive(Debug, Clone)]
pub struct ChallengeSession {
    recording: RecordingSession,
    classifier: Arc<TrainedClassifier>,
    predictions: Vec<String>,
}

impl ChallengeSession {
    pub fn new(
        target: impl Into<String>,
        timing: SessionTiming,
        classifier: Arc<TrainedClassifier>,
    ) -> Self {
        Self {
            recording: RecordingSession::new(target, timing),
            classifier,
            predictions: Vec::new(),
        }
    }

    pub fn target(&self) -> &str {
        self.recording.label()
    }

    pub fn recording(&self) -> &RecordingSession {
        &self.recording
    }

    pub fn predictions(&self) -> &[String] {
        &self.predictions
    }

    pub fn status(&self) -> SessionStatus {
        self.recording.status()
    }

    pub fn start(&mut self, now: Instant) -> Result<(), SessionError> {
        self.recording.start(now)
    }

    pub fn offer(&mut self, now: Instant, hands: &[Hand]) -> FrameDisposition {
        let disposition = self.recording.offer(now, hands);
        if disposition == FrameDisposition::Recorded
            && let Some(features) = self.recording.samples().last()
        {
            match self.classifier.predict(features) {
                Ok(prediction) => self.predictions.push(prediction.label),
                Err(err) => {
                    warn!(target_letter = %self.target(), "Challenge frame not classified: {err}")
                }
            }
        }
        disposition
    }

    pub fn poll(&mut self, now: Instant) -> SessionStatus {
        self.recording.poll(now)
    }

    pub fn finish(self, policy: &ChallengePolicy) -> Result<ChallengeOutcome, SessionError> {
        let status = self.recording.status();
        if status != SessionStatus::Complete {
            return Err(SessionError::NotComplete { status });
        }
        let outcome = evaluate_predictions(self.target(), &self.predictions, policy);
        info!(
            target_letter = %self.target(),
            predictions = self.predictions.len(),
            accuracy = ?outcome.accuracy(),
            success = outcome.is_success(),
            "Challenge evaluated"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::LabelSet;
    use crate::landmarks::{FEATURE_LEN, synthetic_hand};
    use crate::ml::mlp::MlpClassifier;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;

    fn labels(correct: usize, wrong: usize) -> Vec<&'static str> {
        let mut out = vec!["A"; correct];
        out.extend(std::iter::repeat_n("B", wrong));
        out
    }

    #[test]
    fn four_predictions_fail_regardless_of_accuracy() {
        let outcome = evaluate_predictions("A", &labels(4, 0), &ChallengePolicy::default());
        assert_eq!(
            outcome,
            ChallengeOutcome::Failure(ChallengeFailure::InsufficientSamples {
                collected: 4,
                required: 5
            })
        );
        assert_eq!(outcome.accuracy(), None);
    }

    #[test]
    fn six_of_ten_passes() {
        let outcome = evaluate_predictions("A", &labels(6, 4), &ChallengePolicy::default());
        assert!(outcome.is_success());
        assert_eq!(outcome.accuracy(), Some(0.6));
    }

    #[test]
    fn exactly_half_fails() {
        let outcome = evaluate_predictions("A", &labels(5, 5), &ChallengePolicy::default());
        assert_eq!(
            outcome,
            ChallengeOutcome::Failure(ChallengeFailure::BelowThreshold {
                correct: 5,
                total: 10,
                accuracy: 0.5
            })
        );
    }

    #[test]
    fn zero_minimum_still_needs_one_prediction() {
        let policy = ChallengePolicy {
            min_predictions: 0,
            pass_ratio: 0.5,
        };
        let outcome = evaluate_predictions::<&str>("A", &[], &policy);
        assert!(matches!(
            outcome,
            ChallengeOutcome::Failure(ChallengeFailure::InsufficientSamples { .. })
        ));
    }

    #[test]
    fn session_classifies_each_recorded_frame() {
        let mut rng = StdRng::seed_from_u64(1);
        let model = MlpClassifier::with_architecture(FEATURE_LEN, &[8], 2, &mut rng);
        let classifier =
            Arc::new(TrainedClassifier::new(model, LabelSet::from_labels(["A", "B"])).unwrap());
        let mut session = ChallengeSession::new("A", SessionTiming::challenge(), classifier);
        let t0 = Instant::now();
        session.start(t0).unwrap();
        let hand = [synthetic_hand(0.3)];
        for step in 0..7u64 {
            session.offer(t0 + Duration::from_millis(step * 500), &hand);
        }
        session.offer(t0 + Duration::from_millis(3_250), &[]);
        assert_eq!(session.predictions().len(), 7);
        assert_eq!(session.poll(t0 + Duration::from_secs(5)), SessionStatus::Complete);

        let expected = session.predictions()[0].clone();
        let outcome = session.finish(&ChallengePolicy::default()).unwrap();
        // Identical frames give identical predictions: all right or all wrong.
        assert_eq!(outcome.is_success(), expected == "A");
    }
}
