//! Single-sample inference and argmax decoding.

use tracing::{debug, warn};

use crate::data::Alphabet;
use crate::error::{LearnerError, Result};
use crate::handle::ModelHandle;
use crate::tensor::BitmapSample;

/// Decoded index when no class probability exceeds zero.
pub const UNRECOGNIZED: isize = -1;

/// Index of the strictly largest positive value, scanning in index order.
///
/// The running maximum starts at `0.0`, so an all-zero vector decodes to
/// [`UNRECOGNIZED`] and ties resolve to the earliest index.
///
/// ```
/// use glyphnet_core::predict::{decode_argmax, UNRECOGNIZED};
///
/// assert_eq!(decode_argmax(&[0.1, 0.7, 0.7]), 1);
/// assert_eq!(decode_argmax(&[0.0, 0.0]), UNRECOGNIZED);
/// ```
pub fn decode_argmax(values: &[f32]) -> isize {
    let mut best = 0.0f32;
    let mut index = UNRECOGNIZED;
    for (i, &value) in values.iter().enumerate() {
        if value > best {
            best = value;
            index = i as isize;
        }
    }
    index
}

/// Outcome of classifying one bitmap.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    /// Decoded class index, or [`UNRECOGNIZED`].
    pub index: isize,
    pub probabilities: Vec<f32>,
}

impl Prediction {
    pub fn from_probabilities(probabilities: Vec<f32>) -> Self {
        Self {
            index: decode_argmax(&probabilities),
            probabilities,
        }
    }

    pub fn label(&self) -> Option<usize> {
        usize::try_from(self.index).ok()
    }

    pub fn is_recognized(&self) -> bool {
        self.label().is_some()
    }

    /// Probability of the decoded class; `0.0` when unrecognized.
    pub fn confidence(&self) -> f32 {
        self.label()
            .and_then(|label| self.probabilities.get(label).copied())
            .unwrap_or(0.0)
    }

    pub fn symbol(&self, alphabet: &Alphabet) -> Option<char> {
        self.label().and_then(|label| alphabet.symbol(label))
    }
}

/// Classifies one bitmap with the handle's model.
///
/// # Errors
///
/// * [`LearnerError::TrainingInProgress`] while a fit holds the handle
/// * [`LearnerError::UntrainedModel`] before any fit or load succeeded
/// * [`LearnerError::ShapeMismatch`] if the bitmap side differs from the model input
pub fn predict(handle: &ModelHandle, sample: &BitmapSample) -> Result<Prediction> {
    handle.ensure_idle("predict")?;
    let model = handle.read()?;
    if !model.is_trained() {
        warn!("predict rejected: model is untrained");
        return Err(LearnerError::UntrainedModel);
    }

    let probabilities = model.predict_proba(&sample.to_batch())?;
    let prediction = Prediction::from_probabilities(probabilities.row(0).to_vec());
    debug!(
        index = prediction.index,
        confidence = prediction.confidence(),
        "prediction decoded"
    );
    Ok(prediction)
}
