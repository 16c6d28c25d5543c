//! Multi-epoch training over a captured dataset.
//!
//! Each epoch is one full-batch step: forward, cross-entropy, backward and a
//! single Adam update. The write lock is held only for that step, so the
//! per-epoch callback runs with the model unlocked but still guarded by the
//! handle's training flag.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::TrainingSettings;
use crate::data::Dataset;
use crate::error::{LearnerError, Result};
use crate::handle::{ModelHandle, TrainingGuard};
use crate::logging::EpochLogWriter;

/// Loss observed at the end of one epoch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EpochProgress {
    pub epoch: usize,
    pub loss: f32,
}

/// Outcome of a completed fit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    /// Most recent progress record; `None` when zero epochs were requested.
    pub last: Option<EpochProgress>,
    /// Accuracy on the training set after the final update.
    pub final_accuracy: f32,
    pub elapsed_ms: u128,
}

/// Fit settings shared by the blocking and background entry points.
#[derive(Clone, Debug, PartialEq)]
pub struct Trainer {
    epochs: usize,
    epoch_log: Option<PathBuf>,
}

impl Trainer {
    pub fn new(epochs: usize) -> Self {
        Self {
            epochs,
            epoch_log: None,
        }
    }

    pub fn from_settings(settings: &TrainingSettings) -> Self {
        Self {
            epochs: settings.epochs,
            epoch_log: settings.epoch_log.clone(),
        }
    }

    /// Appends a JSON line per epoch to `path`.
    pub fn with_epoch_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.epoch_log = Some(path.into());
        self
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Trains the handle's model on `dataset`, calling `on_epoch_end` after
    /// every epoch in order.
    ///
    /// # Errors
    ///
    /// * [`LearnerError::EmptyDataset`] with no captured samples
    /// * [`LearnerError::TrainingInProgress`] if another fit holds the handle
    /// * [`LearnerError::ShapeMismatch`] if the dataset does not fit the model
    /// * [`LearnerError::NotCompiled`] if the model has no optimizer
    pub fn fit<F>(
        &self,
        handle: &ModelHandle,
        dataset: &Dataset,
        on_epoch_end: F,
    ) -> Result<TrainingSummary>
    where
        F: FnMut(EpochProgress),
    {
        if dataset.is_empty() {
            warn!("fit rejected: dataset is empty");
            return Err(LearnerError::EmptyDataset);
        }
        let guard = handle.begin_training()?;
        self.run(guard, handle, dataset, on_epoch_end)
    }

    /// Runs [`Trainer::fit`] on a worker thread.
    ///
    /// Validation and the training flag are handled before the thread starts,
    /// so an empty dataset or a busy handle fails here rather than in the job.
    pub fn spawn(&self, handle: &ModelHandle, dataset: Dataset) -> Result<TrainingJob> {
        if dataset.is_empty() {
            warn!("fit rejected: dataset is empty");
            return Err(LearnerError::EmptyDataset);
        }
        let guard = handle.begin_training()?;
        let (sender, progress) = mpsc::channel();
        let trainer = self.clone();
        let handle = handle.clone();

        let worker = thread::Builder::new()
            .name("glyphnet-fit".into())
            .spawn(move || {
                trainer.run(guard, &handle, &dataset, |record| {
                    // a dropped receiver only means nobody is watching
                    let _ = sender.send(record);
                })
            })
            .map_err(|err| LearnerError::io("glyphnet-fit thread", err))?;

        Ok(TrainingJob { progress, worker })
    }

    fn run<F>(
        &self,
        _guard: TrainingGuard,
        handle: &ModelHandle,
        dataset: &Dataset,
        mut on_epoch_end: F,
    ) -> Result<TrainingSummary>
    where
        F: FnMut(EpochProgress),
    {
        let started = Instant::now();
        let (inputs, targets) = dataset.as_tensors();
        let mut epoch_log = self
            .epoch_log
            .as_ref()
            .map(EpochLogWriter::open)
            .transpose()?;

        info!(
            samples = dataset.len(),
            epochs = self.epochs,
            "training started"
        );

        let mut last = None;
        for epoch in 0..self.epochs {
            let loss = handle.write()?.train_step(&inputs, &targets)?;
            let record = EpochProgress { epoch, loss };
            debug!(epoch, loss, "epoch finished");

            if let Some(log) = epoch_log.as_mut() {
                if let Err(err) = log.record(&record) {
                    warn!(error = %err, "failed to append epoch log");
                }
            }
            on_epoch_end(record);
            last = Some(record);
        }

        let final_accuracy = {
            let mut model = handle.write()?;
            if last.is_some() {
                model.mark_trained();
            }
            model.evaluate(&inputs, dataset.labels())?
        };

        let summary = TrainingSummary {
            epochs_run: self.epochs,
            last,
            final_accuracy,
            elapsed_ms: started.elapsed().as_millis(),
        };
        info!(
            epochs = summary.epochs_run,
            loss = summary.last.map(|p| p.loss),
            accuracy = summary.final_accuracy,
            elapsed_ms = summary.elapsed_ms as u64,
            "training finished"
        );
        Ok(summary)
    }
}

/// A fit running on its own thread.
#[derive(Debug)]
pub struct TrainingJob {
    /// Per-epoch records in epoch order; closes when the fit ends.
    pub progress: Receiver<EpochProgress>,
    worker: JoinHandle<Result<TrainingSummary>>,
}

impl TrainingJob {
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Waits for the fit to end and returns its summary.
    pub fn join(self) -> Result<TrainingSummary> {
        self.worker.join().map_err(|_| LearnerError::WorkerPanicked)?
    }
}

/// Blocking fit with a per-epoch callback.
pub fn fit<F>(
    handle: &ModelHandle,
    dataset: &Dataset,
    epochs: usize,
    on_epoch_end: F,
) -> Result<TrainingSummary>
where
    F: FnMut(EpochProgress),
{
    Trainer::new(epochs).fit(handle, dataset, on_epoch_end)
}

/// Background fit reporting progress over a channel.
pub fn spawn_fit(handle: &ModelHandle, dataset: Dataset, epochs: usize) -> Result<TrainingJob> {
    Trainer::new(epochs).spawn(handle, dataset)
}
