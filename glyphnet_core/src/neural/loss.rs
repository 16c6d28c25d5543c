//! Loss and accuracy for softmax classification.

use ndarray::{Array2, Axis};

use crate::predict::decode_argmax;

/// Probability floor/ceiling applied before taking logarithms.
pub const PROBABILITY_EPSILON: f32 = 1e-7;

/// Categorical cross-entropy averaged over the batch.
///
/// # Arguments
///
/// * `probs` - Softmax output, `N×C`
/// * `targets` - One-hot targets, `N×C`
///
/// # Returns
///
/// Tuple of (mean loss, gradient w.r.t. the pre-softmax logits)
pub fn categorical_cross_entropy(probs: &Array2<f32>, targets: &Array2<f32>) -> (f32, Array2<f32>) {
    let n = probs.nrows().max(1) as f32;

    let loss = probs
        .iter()
        .zip(targets.iter())
        .filter(|(_, t)| **t != 0.0)
        .map(|(&p, &t)| -t * p.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON).ln())
        .sum::<f32>()
        / n;

    // softmax and cross-entropy fold into (p - y) / N
    let grad = (probs - targets) / n;

    (loss, grad)
}

/// Fraction of rows whose decoded prediction equals the label.
pub fn accuracy(probs: &Array2<f32>, labels: &[usize]) -> f32 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = probs
        .axis_iter(Axis(0))
        .zip(labels)
        .filter(|(row, label)| {
            let row: Vec<f32> = row.iter().copied().collect();
            decode_argmax(&row) == **label as isize
        })
        .count();
    correct as f32 / labels.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_prediction_costs_ln_c() {
        let probs = Array2::from_elem((2, 4), 0.25);
        let mut targets = Array2::zeros((2, 4));
        targets[[0, 1]] = 1.0;
        targets[[1, 3]] = 1.0;

        let (loss, grad) = categorical_cross_entropy(&probs, &targets);
        assert!((loss - 4.0f32.ln()).abs() < 1e-6);
        assert!((grad[[0, 1]] - (0.25 - 1.0) / 2.0).abs() < 1e-6);
        assert!((grad[[0, 0]] - 0.125).abs() < 1e-6);
    }

    #[test]
    fn zero_probability_is_clipped_not_infinite() {
        let probs = Array2::from_shape_vec((1, 2), vec![1.0, 0.0]).unwrap();
        let targets = Array2::from_shape_vec((1, 2), vec![0.0, 1.0]).unwrap();
        let (loss, _) = categorical_cross_entropy(&probs, &targets);
        assert!(loss.is_finite());
        assert!((loss + PROBABILITY_EPSILON.ln()).abs() < 1e-3);
    }

    #[test]
    fn accuracy_counts_matching_rows() {
        let probs =
            Array2::from_shape_vec((3, 2), vec![0.9, 0.1, 0.2, 0.8, 0.6, 0.4]).unwrap();
        assert!((accuracy(&probs, &[0, 1, 1]) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(accuracy(&probs, &[]), 0.0);
    }
}
