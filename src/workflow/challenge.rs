use std::time::{Duration, Instant};

use tracing::warn;

use super::{WorkflowError, detect_hands, require_flow};
use crate::detector::{DetectorLease, Flow, HandDetector};
use crate::inference::{ClassifierHandle, InferenceError};
use crate::landmarks::Hand;
use crate::session::{
    ChallengeOutcome, ChallengePolicy, ChallengeSession, SessionError, SessionStatus, SessionTiming,
};

/// What the challenge page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeStatus {
    Idle,
    /// Whole seconds left, rounded up.
    Recording { remaining_secs: u64 },
    Success,
    Failure,
}

/// Runs one timed challenge at a time and holds its verdict for a while.
///
/// The caller owns the detector lease; [`ChallengeFlow::tick_frame`] only
/// accepts a lease taken for [`Flow::Challenge`].
pub struct ChallengeFlow {
    classifier: ClassifierHandle,
    timing: SessionTiming,
    policy: ChallengePolicy,
    result_hold: Duration,
    session: Option<ChallengeSession>,
    result: Option<(ChallengeOutcome, Instant)>,
}

impl ChallengeFlow {
    pub const DEFAULT_RESULT_HOLD: Duration = Duration::from_secs(3);

    pub fn new(classifier: ClassifierHandle, policy: ChallengePolicy) -> Self {
        Self {
            classifier,
            timing: SessionTiming::challenge(),
            policy,
            result_hold: Self::DEFAULT_RESULT_HOLD,
            session: None,
            result: None,
        }
    }

    pub fn with_timing(mut self, timing: SessionTiming, result_hold: Duration) -> Self {
        self.timing = timing;
        self.result_hold = result_hold;
        self
    }

    pub fn policy(&self) -> &ChallengePolicy {
        &self.policy
    }

    /// Outcome of the most recent finished challenge.
    pub fn last_outcome(&self) -> Option<&ChallengeOutcome> {
        self.result.as_ref().map(|(outcome, _)| outcome)
    }

    /// Start a challenge for `target` with the classifier installed right now.
    pub fn start(&mut self, target: &str, now: Instant) -> Result<(), WorkflowError> {
        if let Some(session) = &self.session {
            return Err(SessionError::NotIdle {
                status: session.status(),
            }
            .into());
        }
        let classifier = self.classifier.snapshot().ok_or(InferenceError::NoModel)?;
        if classifier.labels().index_of(target).is_none() {
            warn!(target_letter = target, "Challenge letter is not in the model's label set");
        }
        let mut session = ChallengeSession::new(target, self.timing, classifier);
        session.start(now)?;
        self.session = Some(session);
        self.result = None;
        Ok(())
    }

    /// Detect hands in `frame` with the leased detector, then [`tick`](Self::tick).
    pub fn tick_frame<D: HandDetector>(
        &mut self,
        lease: &mut DetectorLease<'_, D>,
        frame: &D::Frame,
        timestamp: Duration,
        now: Instant,
    ) -> Result<ChallengeStatus, WorkflowError> {
        require_flow(lease, Flow::Challenge)?;
        let hands = detect_hands(lease, frame, timestamp);
        self.tick(now, &hands)
    }

    /// Feed one frame's detections and return the status to show.
    pub fn tick(&mut self, now: Instant, hands: &[Hand]) -> Result<ChallengeStatus, WorkflowError> {
        if let Some(session) = self.session.as_mut() {
            session.offer(now, hands);
            if session.poll(now) == SessionStatus::Complete
                && let Some(session) = self.session.take()
            {
                let outcome = session.finish(&self.policy)?;
                self.result = Some((outcome, now));
            }
        }
        Ok(self.status(now))
    }

    pub fn status(&self, now: Instant) -> ChallengeStatus {
        if let Some(session) = &self.session {
            let remaining = session.recording().remaining(now);
            return ChallengeStatus::Recording {
                remaining_secs: remaining.as_millis().div_ceil(1000) as u64,
            };
        }
        match &self.result {
            Some((outcome, at)) if now.saturating_duration_since(*at) < self.result_hold => {
                if outcome.is_success() {
                    ChallengeStatus::Success
                } else {
                    ChallengeStatus::Failure
                }
            }
            _ => ChallengeStatus::Idle,
        }
    }
}
