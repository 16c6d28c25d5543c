use ndarray::{Array2, Array4, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{LearnerError, Result};

/// A square single-channel raster of ink intensities in `[0.0, 1.0]`.
///
/// Background is `0.0`, fully inked cells are `1.0`. Samples are the only
/// input type the classifier accepts, both for training and for inference.
///
/// # Examples
///
/// ```
/// use glyphnet_core::BitmapSample;
///
/// let blank = BitmapSample::blank(28);
/// assert_eq!(blank.side(), 28);
/// assert_eq!(blank.ink_fraction(), 0.0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BitmapRecord")]
pub struct BitmapSample {
    pixels: Array2<f32>,
}

/// Serialized form of a [`BitmapSample`]; rebuilt through `from_array`.
#[derive(Deserialize)]
struct BitmapRecord {
    pixels: Array2<f32>,
}

impl TryFrom<BitmapRecord> for BitmapSample {
    type Error = LearnerError;

    fn try_from(record: BitmapRecord) -> Result<Self> {
        Self::from_array(record.pixels)
    }
}

/// Summary statistics of a bitmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitmapStatistics {
    pub mean: f32,
    pub max: f32,
    /// Fraction of cells with any ink at all.
    pub coverage: f32,
}

impl BitmapSample {
    /// All-background sample of side `side`.
    pub fn blank(side: usize) -> Self {
        Self {
            pixels: Array2::zeros((side, side)),
        }
    }

    /// Sample with every cell set to `value` (clamped to `[0, 1]`).
    pub fn filled(side: usize, value: f32) -> Self {
        Self {
            pixels: Array2::from_elem((side, side), value.clamp(0.0, 1.0)),
        }
    }

    /// Wraps a square intensity grid.
    pub fn from_array(pixels: Array2<f32>) -> Result<Self> {
        let (rows, cols) = pixels.dim();
        if rows != cols || rows == 0 {
            return Err(LearnerError::ShapeMismatch {
                context: "bitmap sample",
                expected: vec![rows.max(cols), rows.max(cols)],
                found: vec![rows, cols],
            });
        }
        Ok(Self {
            pixels: pixels.mapv(|v| v.clamp(0.0, 1.0)),
        })
    }

    /// Builds a sample from row-major values.
    pub fn from_vec(side: usize, values: Vec<f32>) -> Result<Self> {
        let found = values.len();
        let pixels =
            Array2::from_shape_vec((side, side), values).map_err(|_| LearnerError::ShapeMismatch {
                context: "bitmap sample",
                expected: vec![side * side],
                found: vec![found],
            })?;
        Self::from_array(pixels)
    }

    /// Builds a sample by evaluating `f(row, col)` for every cell.
    pub fn from_fn<F>(side: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> f32,
    {
        Self {
            pixels: Array2::from_shape_fn((side, side), |(r, c)| f(r, c).clamp(0.0, 1.0)),
        }
    }

    /// The sample as a `1×S×S×1` batch.
    pub fn to_batch(&self) -> Array4<f32> {
        let side = self.side();
        let mut batch = Array4::<f32>::zeros((1, side, side, 1));
        batch
            .index_axis_mut(Axis(0), 0)
            .index_axis_mut(Axis(2), 0)
            .assign(&self.pixels);
        batch
    }

    pub fn side(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.pixels.view()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.pixels.get((row, col)).copied()
    }

    pub fn ink_fraction(&self) -> f32 {
        self.statistics().coverage
    }

    pub fn statistics(&self) -> BitmapStatistics {
        let n = self.pixels.len() as f32;
        let (sum, max, inked) = self
            .pixels
            .iter()
            .fold((0.0f32, 0.0f32, 0usize), |(sum, max, inked), &v| {
                (sum + v, max.max(v), inked + usize::from(v > 0.0))
            });
        BitmapStatistics {
            mean: sum / n,
            max,
            coverage: inked as f32 / n,
        }
    }

    /// Row-major copy of the intensities.
    pub fn to_vec(&self) -> Vec<f32> {
        self.pixels.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_rejects_non_square_lengths() {
        let err = BitmapSample::from_vec(4, vec![0.0; 15]).unwrap_err();
        assert!(matches!(err, LearnerError::ShapeMismatch { .. }));
    }

    #[test]
    fn values_are_clamped_to_unit_range() {
        let sample = BitmapSample::from_vec(2, vec![-1.0, 0.5, 2.0, 1.0]).unwrap();
        assert_eq!(sample.to_vec(), vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn statistics_report_mean_and_coverage() {
        let sample = BitmapSample::from_fn(4, |r, _| if r == 0 { 1.0 } else { 0.0 });
        let stats = sample.statistics();
        assert!((stats.mean - 0.25).abs() < 1e-6);
        assert_eq!(stats.max, 1.0);
        assert!((stats.coverage - 0.25).abs() < 1e-6);
    }

    #[test]
    fn to_batch_places_pixels_in_a_single_channel() {
        let sample = BitmapSample::from_fn(3, |r, c| if (r, c) == (2, 0) { 0.75 } else { 0.0 });
        let batch = sample.to_batch();
        assert_eq!(batch.dim(), (1, 3, 3, 1));
        assert_eq!(batch[[0, 2, 0, 0]], 0.75);
        assert_eq!(batch.sum(), 0.75);
    }

    #[test]
    fn deserializing_requires_a_square_grid() {
        let wide = serde_json::json!({
            "pixels": { "v": 1, "dim": [2, 3], "data": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0] }
        });
        assert!(serde_json::from_value::<BitmapSample>(wide).is_err());

        let sample = BitmapSample::from_fn(3, |r, c| (r * 3 + c) as f32 / 8.0);
        let json = serde_json::to_string(&sample).unwrap();
        let restored: BitmapSample = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, sample);
        assert_eq!(restored.to_batch().dim(), (1, 3, 3, 1));
    }
}
