use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use super::{WorkflowError, detect_hands, require_flow};
use crate::dataset::{LetterCollection, check_label, save_collection};
use crate::detector::{DetectorLease, Flow, HandDetector};
use crate::landmarks::Hand;
use crate::session::{RecordingSession, SessionError, SessionStatus, SessionTiming};

/// State after one collection tick.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionTick {
    pub status: SessionStatus,
    pub samples: usize,
    pub remaining: Duration,
    /// Set on the tick that completed and persisted a session.
    pub saved: Option<PathBuf>,
}

type StatusObserver = Box<dyn FnMut(&str, SessionStatus) + Send>;

/// Records one letter at a time and writes each finished session to
/// `dataset_<LABEL>.json`, replacing the previous file for that letter.
///
/// The caller owns the detector lease; [`CollectionFlow::tick_frame`] only
/// accepts a lease taken for [`Flow::DataCollection`].
pub struct CollectionFlow {
    dataset_dir: PathBuf,
    timing: SessionTiming,
    session: Option<RecordingSession>,
    /// Finished recording whose save failed, kept for [`CollectionFlow::retry_save`].
    unsaved: Option<LetterCollection>,
    recorded: BTreeMap<String, usize>,
    observer: Option<StatusObserver>,
}

impl CollectionFlow {
    pub fn new(dataset_dir: impl Into<PathBuf>, timing: SessionTiming) -> Self {
        Self {
            dataset_dir: dataset_dir.into(),
            timing,
            session: None,
            unsaved: None,
            recorded: BTreeMap::new(),
            observer: None,
        }
    }

    pub fn dataset_dir(&self) -> &Path {
        &self.dataset_dir
    }

    /// Called with the letter and new status on every transition.
    pub fn set_status_observer(
        &mut self,
        observer: impl FnMut(&str, SessionStatus) + Send + 'static,
    ) {
        self.observer = Some(Box::new(observer));
    }

    /// Letter currently recording, if any.
    pub fn active_label(&self) -> Option<&str> {
        self.session.as_ref().map(RecordingSession::label)
    }

    /// Sample count of the last saved session per letter.
    pub fn recorded_counts(&self) -> &BTreeMap<String, usize> {
        &self.recorded
    }

    /// Letter of a finished recording that still needs saving.
    pub fn unsaved_label(&self) -> Option<&str> {
        self.unsaved.as_ref().map(|collection| collection.label.as_str())
    }

    pub fn start(&mut self, label: &str, now: Instant) -> Result<(), WorkflowError> {
        if let Some(active) = &self.session {
            return Err(SessionError::NotIdle {
                status: active.status(),
            }
            .into());
        }
        check_label(label)?;
        let mut session = RecordingSession::new(label, self.timing);
        session.start(now)?;
        self.session = Some(session);
        self.notify(label, SessionStatus::Recording);
        Ok(())
    }

    /// Detect hands in `frame` with the leased detector, then [`tick`](Self::tick).
    pub fn tick_frame<D: HandDetector>(
        &mut self,
        lease: &mut DetectorLease<'_, D>,
        frame: &D::Frame,
        timestamp: Duration,
        now: Instant,
    ) -> Result<CollectionTick, WorkflowError> {
        require_flow(lease, Flow::DataCollection)?;
        let hands = detect_hands(lease, frame, timestamp);
        self.tick(now, &hands)
    }

    /// Feed one frame's detections. Completion saves the collection.
    pub fn tick(&mut self, now: Instant, hands: &[Hand]) -> Result<CollectionTick, WorkflowError> {
        let mut tick = match self.session.as_mut() {
            Some(session) => {
                session.offer(now, hands);
                CollectionTick {
                    status: session.poll(now),
                    samples: session.samples().len(),
                    remaining: session.remaining(now),
                    saved: None,
                }
            }
            None => CollectionTick {
                status: SessionStatus::Idle,
                samples: 0,
                remaining: Duration::ZERO,
                saved: None,
            },
        };
        if tick.status != SessionStatus::Complete {
            return Ok(tick);
        }
        let Some(session) = self.session.take() else {
            return Ok(tick);
        };

        let label = session.label().to_string();
        self.notify(&label, SessionStatus::Complete);
        if let Some(collection) = session.finish()? {
            if let Some(dropped) = self.unsaved.replace(collection) {
                warn!(label = %dropped.label, "Discarding unsaved recording");
            }
            tick.saved = Some(self.retry_save()?);
        }
        Ok(tick)
    }

    /// Save the finished recording left over from a failed save.
    ///
    /// On failure the recording stays pending, so this can be called again.
    pub fn retry_save(&mut self) -> Result<PathBuf, WorkflowError> {
        let Some(collection) = self.unsaved.as_ref() else {
            return Err(SessionError::NotComplete {
                status: SessionStatus::Idle,
            }
            .into());
        };
        let path = save_collection(&self.dataset_dir, collection).inspect_err(|err| {
            error!(label = %collection.label, "Failed to save recorded samples: {err}");
        })?;
        let label = collection.label.clone();
        let samples = collection.len();
        self.unsaved = None;
        self.recorded.insert(label.clone(), samples);
        info!(label = %label, samples, path = %path.display(), "Collection saved");
        Ok(path)
    }

    fn notify(&mut self, label: &str, status: SessionStatus) {
        if let Some(observer) = self.observer.as_mut() {
            observer(label, status);
        }
    }
}
