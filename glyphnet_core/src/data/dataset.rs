//! Append-only store of labeled bitmap samples.

use ndarray::{Array2, Array4, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{LearnerError, Result};
use crate::tensor::BitmapSample;

/// A bitmap paired with its class label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub sample: BitmapSample,
    pub label: usize,
}

/// Labeled samples captured during one session.
///
/// Samples and labels live in parallel vectors, so entry `i` of one always
/// pairs with entry `i` of the other. Labels are kept as raw integers and
/// only expanded to one-hot rows by [`Dataset::as_tensors`]. Deserialized
/// datasets are rebuilt through [`Dataset::append`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetRecord")]
pub struct Dataset {
    sample_size: usize,
    num_classes: usize,
    samples: Vec<BitmapSample>,
    labels: Vec<usize>,
}

/// Serialized form of a [`Dataset`], validated on the way in.
#[derive(Deserialize)]
struct DatasetRecord {
    sample_size: usize,
    num_classes: usize,
    samples: Vec<BitmapSample>,
    labels: Vec<usize>,
}

impl TryFrom<DatasetRecord> for Dataset {
    type Error = LearnerError;

    fn try_from(record: DatasetRecord) -> Result<Self> {
        if record.samples.len() != record.labels.len() {
            return Err(LearnerError::ShapeMismatch {
                context: "dataset record",
                expected: vec![record.labels.len()],
                found: vec![record.samples.len()],
            });
        }
        let mut dataset = Dataset::new(record.sample_size, record.num_classes);
        for (sample, label) in record.samples.into_iter().zip(record.labels) {
            dataset.append(sample, label)?;
        }
        Ok(dataset)
    }
}

impl Dataset {
    pub fn new(sample_size: usize, num_classes: usize) -> Self {
        Self {
            sample_size,
            num_classes,
            samples: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Appends one example.
    ///
    /// # Errors
    ///
    /// [`LearnerError::LabelOutOfRange`] for labels `>= num_classes` and
    /// [`LearnerError::ShapeMismatch`] for samples of the wrong side. The
    /// dataset is unchanged on error.
    pub fn append(&mut self, sample: BitmapSample, label: usize) -> Result<()> {
        if label >= self.num_classes {
            return Err(LearnerError::LabelOutOfRange {
                label,
                num_classes: self.num_classes,
            });
        }
        if sample.side() != self.sample_size {
            return Err(LearnerError::ShapeMismatch {
                context: "dataset append",
                expected: vec![self.sample_size, self.sample_size],
                found: vec![sample.side(), sample.side()],
            });
        }
        self.samples.push(sample);
        self.labels.push(label);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn samples(&self) -> &[BitmapSample] {
        &self.samples
    }

    pub fn get(&self, index: usize) -> Option<LabeledExample> {
        Some(LabeledExample {
            sample: self.samples.get(index)?.clone(),
            label: *self.labels.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BitmapSample, usize)> + '_ {
        self.samples.iter().zip(self.labels.iter().copied())
    }

    /// Number of captured examples per label.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }

    /// Drops every example; used when a new session starts.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.labels.clear();
    }

    /// Stacks samples into an `N×S×S×1` batch and labels into `N×C` one-hot rows.
    pub fn as_tensors(&self) -> (Array4<f32>, Array2<f32>) {
        let n = self.len();
        let s = self.sample_size;

        let mut inputs = Array4::<f32>::zeros((n, s, s, 1));
        for (mut slot, sample) in inputs.axis_iter_mut(Axis(0)).zip(&self.samples) {
            slot.index_axis_mut(Axis(2), 0).assign(&sample.view());
        }

        let mut targets = Array2::<f32>::zeros((n, self.num_classes));
        for (row, &label) in self.labels.iter().enumerate() {
            targets[[row, label]] = 1.0;
        }

        (inputs, targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn tagged_sample(side: usize, tag: usize) -> BitmapSample {
        // cell (0, 0) encodes the append position so it can be traced back
        BitmapSample::from_fn(side, |r, c| {
            if r == 0 && c == 0 {
                tag as f32 / 1000.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn as_tensors_preserves_index_correspondence() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..5 {
            let mut dataset = Dataset::new(6, 26);
            let count = rng.gen_range(1..40);
            let mut expected = Vec::new();
            for i in 0..count {
                let label = rng.gen_range(0..26);
                dataset.append(tagged_sample(6, i + 1), label).unwrap();
                expected.push(label);
            }

            let (inputs, targets) = dataset.as_tensors();
            assert_eq!(inputs.dim(), (count, 6, 6, 1));
            assert_eq!(targets.dim(), (count, 26));

            for (i, &label) in expected.iter().enumerate() {
                let tag = (inputs[[i, 0, 0, 0]] * 1000.0).round() as usize;
                assert_eq!(tag, i + 1);
                let row = targets.row(i);
                assert_eq!(row.sum(), 1.0);
                assert_eq!(row[label], 1.0);
            }
        }
    }

    #[test]
    fn out_of_range_label_is_rejected_without_mutation() {
        let mut dataset = Dataset::new(4, 3);
        dataset.append(BitmapSample::blank(4), 2).unwrap();
        let err = dataset.append(BitmapSample::blank(4), 3).unwrap_err();
        assert!(matches!(
            err,
            LearnerError::LabelOutOfRange {
                label: 3,
                num_classes: 3
            }
        ));
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn wrong_side_is_rejected() {
        let mut dataset = Dataset::new(28, 26);
        let err = dataset.append(BitmapSample::blank(27), 0).unwrap_err();
        assert!(matches!(err, LearnerError::ShapeMismatch { .. }));
        assert!(dataset.is_empty());
    }

    #[test]
    fn labels_stay_raw_integers_and_counts_track_them() {
        let mut dataset = Dataset::new(4, 4);
        for label in [1, 3, 1, 0] {
            dataset.append(BitmapSample::blank(4), label).unwrap();
        }
        assert_eq!(dataset.labels(), &[1, 3, 1, 0]);
        assert_eq!(dataset.class_counts(), vec![1, 2, 0, 1]);
        assert_eq!(dataset.get(1).unwrap().label, 3);

        dataset.reset();
        assert!(dataset.is_empty());
        assert_eq!(dataset.as_tensors().0.dim(), (0, 4, 4, 1));
    }

    #[test]
    fn serde_round_trip_keeps_examples() {
        let mut dataset = Dataset::new(4, 3);
        dataset.append(tagged_sample(4, 1), 2).unwrap();
        dataset.append(tagged_sample(4, 2), 0).unwrap();

        let json = serde_json::to_string(&dataset).unwrap();
        let restored: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, dataset);
        assert_eq!(restored.class_counts(), vec![1, 0, 1]);
    }

    #[test]
    fn deserializing_rejects_records_append_would_refuse() {
        let blank = serde_json::to_value(BitmapSample::blank(4)).unwrap();
        let wrong_side = serde_json::to_value(BitmapSample::blank(3)).unwrap();

        let unpaired = serde_json::json!({
            "sample_size": 16, "num_classes": 2, "samples": [], "labels": [5]
        });
        let bad_label = serde_json::json!({
            "sample_size": 4, "num_classes": 2, "samples": [blank], "labels": [2]
        });
        let bad_side = serde_json::json!({
            "sample_size": 4, "num_classes": 2, "samples": [wrong_side], "labels": [0]
        });

        for record in [unpaired, bad_label, bad_side] {
            assert!(serde_json::from_value::<Dataset>(record).is_err());
        }
    }
}
