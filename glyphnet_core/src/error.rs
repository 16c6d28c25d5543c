//! Error types surfaced by the capture, training, prediction and storage APIs.
//!
//! Every failing operation leaves the dataset, the model parameters and the
//! persisted slot in their pre-call state, so callers may fix the
//! precondition and retry.

use std::path::PathBuf;

use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;

/// Result type alias for learner operations.
pub type Result<T> = std::result::Result<T, LearnerError>;

/// Errors returned by the glyph learner pipeline.
#[derive(Debug, thiserror::Error)]
pub enum LearnerError {
    /// `fit` was called with a dataset that holds no examples.
    #[error("cannot train on an empty dataset; capture at least one sample first")]
    EmptyDataset,

    /// `predict` was called before any successful fit or load.
    #[error("model has not been trained or loaded yet")]
    UntrainedModel,

    /// `load` referenced a slot that was never saved.
    #[error("no saved model in slot '{slot}'")]
    SlotNotFound { slot: String },

    /// A sample or batch did not match the shape the model expects.
    #[error("shape mismatch in {context}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Another `fit` is still running on the same model handle.
    #[error("training is in progress on this model")]
    TrainingInProgress,

    /// A label fell outside the alphabet.
    #[error("label {label} is outside the alphabet of {num_classes} symbols")]
    LabelOutOfRange { label: usize, num_classes: usize },

    /// The model has no loss/optimizer wiring and cannot be trained.
    #[error("model is not compiled; call compile() before training")]
    NotCompiled,

    /// The requested input side or class count cannot host the fixed architecture.
    #[error("invalid architecture: {0}")]
    InvalidArchitecture(String),

    /// A drawing surface could not be created with the requested dimensions.
    #[error("invalid drawing surface {width}x{height}")]
    InvalidSurface { width: u32, height: u32 },

    /// Slot names are restricted to ASCII letters, digits, `-` and `_`.
    #[error("invalid slot name '{0}'")]
    InvalidSlotName(String),

    /// A thread panicked while holding the model lock.
    #[error("model lock poisoned")]
    LockPoisoned,

    /// Training worker thread panicked before returning a summary.
    #[error("training worker panicked")]
    WorkerPanicked,

    /// A configuration value could not be turned into a pipeline component.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The checkpoint codec rejected a slot payload.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Filesystem failure while touching model storage.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LearnerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LearnerError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_precondition() {
        let err = LearnerError::SlotNotFound {
            slot: "model".into(),
        };
        assert_eq!(err.to_string(), "no saved model in slot 'model'");

        let err = LearnerError::ShapeMismatch {
            context: "forward",
            expected: vec![1, 28, 28, 1],
            found: vec![1, 27, 28, 1],
        };
        assert!(err.to_string().contains("[1, 28, 28, 1]"));
    }
}
