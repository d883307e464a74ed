use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{SessionError, SessionStatus, SessionTiming};
use crate::dataset::LetterCollection;
use crate::landmarks::{FeatureVector, Hand, LandmarkError, normalize_detection};

/// What happened to one offered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    Recorded,
    /// No hand in the frame.
    NoHand,
    /// Sampling slot already filled or not yet open.
    NotDue,
    /// Session idle or already complete.
    NotRecording,
    /// Frame arrived past the deadline; the session is now complete.
    Completed,
}

/// One timed capture of feature vectors for a target label.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    label: String,
    timing: SessionTiming,
    status: SessionStatus,
    started_at: Option<Instant>,
    last_slot: Option<u128>,
    samples: Vec<FeatureVector>,
}

impl RecordingSession {
    pub fn new(label: impl Into<String>, timing: SessionTiming) -> Self {
        Self {
            label: label.into(),
            timing,
            status: SessionStatus::Idle,
            started_at: None,
            last_slot: None,
            samples: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn timing(&self) -> SessionTiming {
        self.timing
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Samples recorded so far, oldest first.
    pub fn samples(&self) -> &[FeatureVector] {
        &self.samples
    }

    pub fn start(&mut self, now: Instant) -> Result<(), SessionError> {
        if self.status != SessionStatus::Idle {
            return Err(SessionError::NotIdle {
                status: self.status,
            });
        }
        self.status = SessionStatus::Recording;
        self.started_at = Some(now);
        info!(
            label = %self.label,
            duration_ms = self.timing.duration.as_millis() as u64,
            "Recording started"
        );
        Ok(())
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// Time left before the session completes; zero unless recording.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.status {
            SessionStatus::Recording => self.timing.duration.saturating_sub(self.elapsed(now)),
            SessionStatus::Idle => self.timing.duration,
            SessionStatus::Complete => Duration::ZERO,
        }
    }

    /// Offer one detection result captured at `now`.
    pub fn offer(&mut self, now: Instant, hands: &[Hand]) -> FrameDisposition {
        if self.status != SessionStatus::Recording {
            return FrameDisposition::NotRecording;
        }
        let elapsed = self.elapsed(now);
        if elapsed > self.timing.duration {
            self.complete();
            return FrameDisposition::Completed;
        }

        let slot = match self.timing.interval() {
            Some(interval) => {
                let slot = elapsed.as_nanos() / interval.as_nanos();
                if slot == 0 || self.last_slot.is_some_and(|last| slot <= last) {
                    self.complete_at_deadline(elapsed);
                    return FrameDisposition::NotDue;
                }
                Some(slot)
            }
            None => None,
        };

        let disposition = match normalize_detection(hands) {
            Ok(features) => {
                self.samples.push(features);
                if slot.is_some() {
                    self.last_slot = slot;
                }
                FrameDisposition::Recorded
            }
            Err(LandmarkError::NoDetection) => FrameDisposition::NoHand,
        };
        self.complete_at_deadline(elapsed);
        disposition
    }

    /// Advance the clock without a frame; returns the status afterwards.
    pub fn poll(&mut self, now: Instant) -> SessionStatus {
        if self.status == SessionStatus::Recording {
            let elapsed = self.elapsed(now);
            self.complete_at_deadline(elapsed);
        }
        self.status
    }

    /// Collected samples as a letter collection, or `None` when nothing was
    /// recorded.
    pub fn finish(self) -> Result<Option<LetterCollection>, SessionError> {
        if self.status != SessionStatus::Complete {
            return Err(SessionError::NotComplete {
                status: self.status,
            });
        }
        if self.samples.is_empty() {
            info!(label = %self.label, "Recording finished without samples");
            return Ok(None);
        }
        Ok(Some(LetterCollection::new(self.label, self.samples)))
    }

    fn complete_at_deadline(&mut self, elapsed: Duration) {
        if elapsed >= self.timing.duration {
            self.complete();
        }
    }

    fn complete(&mut self) {
        if self.status != SessionStatus::Complete {
            self.status = SessionStatus::Complete;
            debug!(label = %self.label, samples = self.samples.len(), "Recording complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::synthetic_hand;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn starts_idle_and_rejects_double_start() {
        let mut session = RecordingSession::new("A", SessionTiming::collection());
        assert_eq!(session.status(), SessionStatus::Idle);
        let now = Instant::now();
        session.start(now).unwrap();
        assert_eq!(
            session.start(now),
            Err(SessionError::NotIdle {
                status: SessionStatus::Recording
            })
        );
    }

    #[test]
    fn dense_frames_are_capped_by_interval() {
        let timing = SessionTiming::collection();
        let mut session = RecordingSession::new("A", timing);
        let t0 = Instant::now();
        session.start(t0).unwrap();
        let hand = [synthetic_hand(0.5)];
        // 60 fps for the whole window and a little beyond.
        let mut t = 0;
        while t <= 3_200 {
            session.offer(t0 + ms(t), &hand);
            t += 16;
        }
        assert_eq!(session.status(), SessionStatus::Complete);
        let max = timing.max_samples().unwrap();
        assert!(session.samples().len() <= max);
        assert!(session.samples().len() >= max - 1);
    }

    #[test]
    fn one_sample_per_slot() {
        let mut session = RecordingSession::new("B", SessionTiming::collection());
        let t0 = Instant::now();
        session.start(t0).unwrap();
        let hand = [synthetic_hand(0.1)];
        assert_eq!(session.offer(t0 + ms(50), &hand), FrameDisposition::NotDue);
        assert_eq!(session.offer(t0 + ms(120), &hand), FrameDisposition::Recorded);
        assert_eq!(session.offer(t0 + ms(180), &hand), FrameDisposition::NotDue);
        assert_eq!(session.offer(t0 + ms(210), &hand), FrameDisposition::Recorded);
        assert_eq!(session.samples().len(), 2);
    }

    #[test]
    fn frames_without_hands_record_nothing() {
        let mut session = RecordingSession::new("C", SessionTiming::collection());
        let t0 = Instant::now();
        session.start(t0).unwrap();
        for step in 1..=30 {
            assert_eq!(session.offer(t0 + ms(step * 100), &[]), FrameDisposition::NoHand);
        }
        assert_eq!(session.poll(t0 + ms(3_000)), SessionStatus::Complete);
        assert_eq!(session.finish().unwrap(), None);
    }

    #[test]
    fn late_frame_completes_and_is_dropped() {
        let mut session = RecordingSession::new("D", SessionTiming::challenge());
        let t0 = Instant::now();
        session.start(t0).unwrap();
        let hand = [synthetic_hand(0.2)];
        assert_eq!(session.offer(t0 + ms(10), &hand), FrameDisposition::Recorded);
        assert_eq!(session.offer(t0 + ms(5_001), &hand), FrameDisposition::Completed);
        assert_eq!(session.offer(t0 + ms(5_002), &hand), FrameDisposition::NotRecording);
        let collection = session.finish().unwrap().unwrap();
        assert_eq!(collection.label, "D");
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn finish_requires_completion() {
        let mut session = RecordingSession::new("E", SessionTiming::challenge());
        session.start(Instant::now()).unwrap();
        assert_eq!(
            session.finish().unwrap_err(),
            SessionError::NotComplete {
                status: SessionStatus::Recording
            }
        );
    }

    #[test]
    fn remaining_counts_down() {
        let mut session = RecordingSession::new("F", SessionTiming::challenge());
        let t0 = Instant::now();
        assert_eq!(session.remaining(t0), ms(5_000));
        session.start(t0).unwrap();
        assert_eq!(session.remaining(t0 + ms(1_500)), ms(3_500));
    }
}
