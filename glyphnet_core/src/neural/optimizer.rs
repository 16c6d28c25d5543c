//! Adam optimizer over named parameter tensors.

use std::collections::HashMap;

use ndarray::{Array, Dimension};

/// Adam optimizer (Adaptive Moment Estimation).
///
/// Moment estimates are keyed by parameter name and stored flat in the
/// parameter's logical iteration order, so one optimizer serves tensors of
/// any rank. The defaults match the reference trainer's `"adam"` setting.
#[derive(Debug, Clone)]
pub struct AdamOptimizer {
    /// Learning rate
    pub learning_rate: f32,
    /// Exponential decay rate for first moment (typically 0.9)
    pub beta1: f32,
    /// Exponential decay rate for second moment (typically 0.999)
    pub beta2: f32,
    /// Small constant for numerical stability
    pub epsilon: f32,
    first_moments: HashMap<String, Vec<f32>>,
    second_moments: HashMap<String, Vec<f32>>,
    /// Completed optimization steps
    t: u32,
}

pub const DEFAULT_LEARNING_RATE: f32 = 0.001;

impl Default for AdamOptimizer {
    fn default() -> Self {
        Self::new(DEFAULT_LEARNING_RATE)
    }
}

impl AdamOptimizer {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            first_moments: HashMap::new(),
            second_moments: HashMap::new(),
            t: 0,
        }
    }

    /// Number of completed optimization steps.
    pub fn steps(&self) -> u32 {
        self.t
    }

    /// Advances the shared time step; call once before updating every
    /// parameter of one batch.
    pub fn begin_step(&mut self) {
        self.t += 1;
    }

    /// Updates `param` in place from `gradient`.
    pub fn update<D: Dimension>(
        &mut self,
        param_name: &str,
        param: &mut Array<f32, D>,
        gradient: &Array<f32, D>,
    ) {
        debug_assert_eq!(param.shape(), gradient.shape());
        let t = self.t.max(1) as i32;
        let len = param.len();

        let m = self
            .first_moments
            .entry(param_name.to_string())
            .or_insert_with(|| vec![0.0; len]);
        let v = self
            .second_moments
            .entry(param_name.to_string())
            .or_insert_with(|| vec![0.0; len]);

        let correction1 = 1.0 - self.beta1.powi(t);
        let correction2 = 1.0 - self.beta2.powi(t);

        for (((p, &g), m), v) in param
            .iter_mut()
            .zip(gradient.iter())
            .zip(m.iter_mut())
            .zip(v.iter_mut())
        {
            *m = self.beta1 * *m + (1.0 - self.beta1) * g;
            *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array2};

    #[test]
    fn first_step_moves_each_weight_by_learning_rate() {
        let mut optimizer = AdamOptimizer::new(0.01);
        let mut param = arr1(&[1.0f32, -1.0, 0.5]);
        let gradient = arr1(&[0.3f32, -2.0, 0.0]);

        optimizer.begin_step();
        optimizer.update("w", &mut param, &gradient);

        // bias correction makes the first step lr * sign(g)
        assert!((param[0] - 0.99).abs() < 1e-5);
        assert!((param[1] + 0.99).abs() < 1e-5);
        assert_eq!(param[2], 0.5);
        assert_eq!(optimizer.steps(), 1);
    }

    #[test]
    fn minimizes_a_quadratic() {
        let mut optimizer = AdamOptimizer::new(0.05);
        let mut param = Array2::from_elem((2, 2), 3.0f32);
        for _ in 0..500 {
            let gradient = param.mapv(|p| 2.0 * (p - 1.0));
            optimizer.begin_step();
            optimizer.update("w", &mut param, &gradient);
        }
        assert!(param.iter().all(|&p| (p - 1.0).abs() < 0.05), "{param:?}");
    }
}
