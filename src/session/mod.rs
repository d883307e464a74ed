//! Timed capture of labeled feature vectors and the challenge evaluation.

mod challenge;
mod recording;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub use challenge::{
    ChallengeFailure, ChallengeOutcome, ChallengePolicy, ChallengeSession, evaluate_predictions,
};
pub use recording::{FrameDisposition, RecordingSession};

/// Lifecycle of a recording: `Idle -> Recording -> Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Recording,
    Complete,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Recording => "recording",
            SessionStatus::Complete => "complete",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session can only start from idle, currently {status}")]
    NotIdle { status: SessionStatus },
    #[error("session is {status}, not complete")]
    NotComplete { status: SessionStatus },
}

/// How long a session records and how often it keeps a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    pub duration: Duration,
    /// `None` keeps every offered frame that carries a hand.
    pub sample_interval: Option<Duration>,
}

impl SessionTiming {
    pub const COLLECTION_DURATION: Duration = Duration::from_secs(3);
    pub const COLLECTION_INTERVAL: Duration = Duration::from_millis(100);
    pub const CHALLENGE_DURATION: Duration = Duration::from_secs(5);

    /// Data collection: 3 s, one sample every 100 ms.
    pub fn collection() -> Self {
        Self {
            duration: Self::COLLECTION_DURATION,
            sample_interval: Some(Self::COLLECTION_INTERVAL),
        }
    }

    /// Challenge: 5 s, every frame.
    pub fn challenge() -> Self {
        Self {
            duration: Self::CHALLENGE_DURATION,
            sample_interval: None,
        }
    }

    /// Non-zero sampling interval, if any.
    pub(crate) fn interval(&self) -> Option<Duration> {
        self.sample_interval.filter(|interval| !interval.is_zero())
    }

    /// Upper bound on recorded samples, `floor(duration / interval)`.
    pub fn max_samples(&self) -> Option<usize> {
        self.interval()
            .map(|interval| (self.duration.as_nanos() / interval.as_nanos()) as usize)
    }
}
