use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::error;

use super::WorkflowError;
use crate::dataset::{BuildOptions, LetterCollection, build_dataset, load_collections};
use crate::inference::ClassifierHandle;
use crate::ml::mlp::{
    EpochProgress, SavedArtifact, TrainOptions, TrainOutcome, TrainingReport, save_trained,
    train_classifier,
};

/// Inputs for one background training run.
#[derive(Debug, Clone)]
pub struct TrainingRequest {
    pub dataset_files: Vec<PathBuf>,
    pub build: BuildOptions,
    pub train: TrainOptions,
    /// Directory for the artifact triple; `None` keeps the result in memory.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum TrainingEvent {
    Progress(EpochProgress),
    Finished {
        report: TrainingReport,
        saved: Option<SavedArtifact>,
    },
    Failed(String),
}

impl TrainingEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TrainingEvent::Progress(_))
    }
}

/// Assemble, split and fit in one call.
pub fn train_from_collections(
    collections: &[LetterCollection],
    build: &BuildOptions,
    train: &TrainOptions,
    progress: Option<&mut dyn FnMut(&EpochProgress)>,
) -> Result<TrainOutcome, WorkflowError> {
    let dataset = build_dataset(collections, build)?;
    Ok(train_classifier(&dataset, train, progress)?)
}

/// Training on a worker thread, reporting over a channel.
///
/// On success the new classifier is installed into the handle, so live
/// inference switches over without restarting.
pub struct TrainingJob {
    rx: Receiver<TrainingEvent>,
    worker: Option<JoinHandle<()>>,
}

impl TrainingJob {
    pub fn spawn(request: TrainingRequest, classifier: ClassifierHandle) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || run_training(request, classifier, &tx));
        Self {
            rx,
            worker: Some(worker),
        }
    }

    /// Next pending event without blocking.
    pub fn try_next(&self) -> Option<TrainingEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the run ends, returning every remaining event.
    pub fn wait(mut self) -> Vec<TrainingEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.recv() {
            let done = event.is_terminal();
            events.push(event);
            if done {
                break;
            }
        }
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("Training worker panicked");
        }
        events
    }
}

fn run_training(
    request: TrainingRequest,
    classifier: ClassifierHandle,
    tx: &Sender<TrainingEvent>,
) {
    let event = match train_and_install(&request, &classifier, tx) {
        Ok((report, saved)) => TrainingEvent::Finished { report, saved },
        Err(err) => {
            error!("Training failed: {err}");
            TrainingEvent::Failed(err.to_string())
        }
    };
    let _ = tx.send(event);
}

fn train_and_install(
    request: &TrainingRequest,
    classifier: &ClassifierHandle,
    tx: &Sender<TrainingEvent>,
) -> Result<(TrainingReport, Option<SavedArtifact>), WorkflowError> {
    let collections = load_collections(&request.dataset_files)?;
    let mut forward = |progress: &EpochProgress| {
        let _ = tx.send(TrainingEvent::Progress(*progress));
    };
    let outcome = train_from_collections(
        &collections,
        &request.build,
        &request.train,
        Some(&mut forward),
    )?;
    let saved = match &request.output_dir {
        Some(dir) => Some(save_trained(dir, &outcome.classifier)?),
        None => None,
    };
    classifier.install(outcome.classifier);
    Ok((outcome.report, saved))
}
