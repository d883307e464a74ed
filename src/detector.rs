//! Hand-landmark detector boundary and exclusive ownership of the instance.
//!
//! The detector (and the camera stream feeding it) is a singleton. Flows take
//! a [`DetectorLease`] from the [`DetectorSlot`] when they start and release
//! it by dropping the lease, so only one flow drives frame consumption at a
//! time.

use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::landmarks::Hand;

/// External pretrained detector invoked as a black box.
pub trait HandDetector {
    /// Video frame type understood by the detector.
    type Frame;

    /// Detect zero or more hands in `frame` captured at `timestamp`.
    fn detect(&mut self, frame: &Self::Frame, timestamp: Duration)
    -> Result<Vec<Hand>, DetectorError>;
}

/// Workflow that currently owns the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    LiveInference,
    DataCollection,
    Challenge,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Flow::LiveInference => "live inference",
            Flow::DataCollection => "data collection",
            Flow::Challenge => "challenge",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum DetectorError {
    /// The detector could not be created; the feature stays disabled.
    #[error("hand detector failed to initialize: {0}")]
    Init(String),
    /// A single detection call failed. The frame is skipped.
    #[error("hand detection failed: {0}")]
    Detect(String),
    /// Another flow holds the detector.
    #[error("hand detector is in use by {holder}")]
    Busy { holder: Flow },
    /// A lease taken for one flow was handed to another.
    #[error("detector lease belongs to {actual}, not {expected}")]
    WrongFlow { expected: Flow, actual: Flow },
    /// No detector has been installed yet.
    #[error("hand detector is not available")]
    Unavailable,
}

struct SlotState<D> {
    detector: Option<D>,
    holder: Option<Flow>,
}

/// Owner of the single detector instance.
pub struct DetectorSlot<D> {
    state: Mutex<SlotState<D>>,
}

impl<D> Default for DetectorSlot<D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<D> DetectorSlot<D> {
    /// Slot without a detector; acquisitions fail until one is installed.
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(SlotState {
                detector: None,
                holder: None,
            }),
        }
    }

    pub fn new(detector: D) -> Self {
        let slot = Self::empty();
        slot.lock().detector = Some(detector);
        slot
    }

    /// Install the outcome of asynchronous detector initialization.
    ///
    /// A failure is logged and leaves the slot empty; there is no automatic
    /// retry. Replacing the detector while a flow holds it is refused.
    pub fn install(&self, init: Result<D, DetectorError>) -> Result<(), DetectorError> {
        match init {
            Ok(detector) => {
                let mut state = self.lock();
                if let Some(holder) = state.holder {
                    warn!(%holder, "Hand detector not replaced while leased");
                    return Err(DetectorError::Busy { holder });
                }
                state.detector = Some(detector);
                debug!("Hand detector installed");
                Ok(())
            }
            Err(err) => {
                warn!("Hand detector unavailable: {err}");
                Err(err)
            }
        }
    }

    /// Take exclusive use of the detector for `flow`.
    pub fn acquire(&self, flow: Flow) -> Result<DetectorLease<'_, D>, DetectorError> {
        let mut state = self.lock();
        if let Some(holder) = state.holder {
            return Err(DetectorError::Busy { holder });
        }
        let detector = state.detector.take().ok_or(DetectorError::Unavailable)?;
        state.holder = Some(flow);
        debug!(%flow, "Detector acquired");
        Ok(DetectorLease {
            slot: self,
            flow,
            detector: Some(detector),
        })
    }

    /// Flow currently holding the detector, if any.
    pub fn holder(&self) -> Option<Flow> {
        self.lock().holder
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<D>> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

/// Scoped exclusive access to the detector. Dropping returns it to the slot.
pub struct DetectorLease<'a, D> {
    slot: &'a DetectorSlot<D>,
    flow: Flow,
    detector: Option<D>,
}

impl<D> DetectorLease<'_, D> {
    pub fn flow(&self) -> Flow {
        self.flow
    }

    /// The leased detector. Only empty once the lease is being dropped.
    pub fn detector(&self) -> Option<&D> {
        self.detector.as_ref()
    }
}

impl<D: HandDetector> DetectorLease<'_, D> {
    /// Run detection on one frame.
    pub fn detect(
        &mut self,
        frame: &D::Frame,
        timestamp: Duration,
    ) -> Result<Vec<Hand>, DetectorError> {
        match self.detector.as_mut() {
            Some(detector) => detector.detect(frame, timestamp),
            None => Err(DetectorError::Unavailable),
        }
    }
}

impl<D> Drop for DetectorLease<'_, D> {
    fn drop(&mut self) {
        let mut state = self.slot.lock();
        state.detector = self.detector.take();
        state.holder = None;
        debug!(flow = %self.flow, "Detector released");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use super::*;

    /// Detector replaying scripted results, one per call.
    #[derive(Default)]
    pub(crate) struct ScriptedDetector {
        pub(crate) script: VecDeque<Vec<Hand>>,
        pub(crate) calls: usize,
    }

    impl ScriptedDetector {
        pub(crate) fn new(script: impl IntoIterator<Item = Vec<Hand>>) -> Self {
            Self {
                script: script.into_iter().collect(),
                calls: 0,
            }
        }
    }

    impl HandDetector for ScriptedDetector {
        type Frame = ();

        fn detect(
            &mut self,
            _frame: &(),
            _timestamp: Duration,
        ) -> Result<Vec<Hand>, DetectorError> {
            self.calls += 1;
            Ok(self.script.pop_front().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedDetector;
    use super::*;

    #[test]
    fn second_flow_is_rejected_while_leased() {
        let slot = DetectorSlot::new(ScriptedDetector::default());
        let lease = slot.acquire(Flow::DataCollection).unwrap();
        assert_eq!(slot.holder(), Some(Flow::DataCollection));
        let err = slot.acquire(Flow::LiveInference).err().unwrap();
        assert!(matches!(err, DetectorError::Busy { holder: Flow::DataCollection }));
        drop(lease);
        assert_eq!(slot.holder(), None);
        assert!(slot.acquire(Flow::LiveInference).is_ok());
    }

    #[test]
    fn detector_state_survives_lease_cycles() {
        let slot = DetectorSlot::new(ScriptedDetector::default());
        {
            let mut lease = slot.acquire(Flow::Challenge).unwrap();
            lease.detect(&(), Duration::ZERO).unwrap();
        }
        let lease = slot.acquire(Flow::LiveInference).unwrap();
        assert_eq!(lease.detector().unwrap().calls, 1);
    }

    #[test]
    fn install_is_refused_while_leased() {
        let slot = DetectorSlot::new(ScriptedDetector::default());
        {
            let mut lease = slot.acquire(Flow::LiveInference).unwrap();
            lease.detect(&(), Duration::ZERO).unwrap();
            let err = slot.install(Ok(ScriptedDetector::default())).unwrap_err();
            assert!(matches!(err, DetectorError::Busy { holder: Flow::LiveInference }));
        }
        // Once released, a replacement takes effect.
        slot.install(Ok(ScriptedDetector::default())).unwrap();
        let lease = slot.acquire(Flow::Challenge).unwrap();
        assert_eq!(lease.detector().unwrap().calls, 0);
    }

    #[test]
    fn failed_init_leaves_slot_unavailable() {
        let slot: DetectorSlot<ScriptedDetector> = DetectorSlot::empty();
        assert!(slot.install(Err(DetectorError::Init("model asset missing".into()))).is_err());
        assert!(matches!(
            slot.acquire(Flow::LiveInference).err(),
            Some(DetectorError::Unavailable)
        ));
        slot.install(Ok(ScriptedDetector::default())).unwrap();
        assert!(slot.acquire(Flow::LiveInference).is_ok());
    }
}
