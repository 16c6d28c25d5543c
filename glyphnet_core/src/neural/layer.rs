//! Convolution, pooling and dense layers on NHWC batches.
//!
//! Layers are stateless with respect to a batch: `forward` borrows the layer
//! immutably and returns everything `backward` needs, so inference can run
//! under a shared borrow while training holds the only mutable one.

use ndarray::{s, Array1, Array2, Array4, ArrayView3, ArrayViewMut3, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Truncation bound of the initializer, in standard deviations.
const TRUNCATION: f32 = 2.0;

/// Draws `count` values from a zero-mean normal with variance `1 / fan_in`,
/// re-sampling anything beyond two standard deviations.
pub fn variance_scaling<R: Rng + ?Sized>(count: usize, fan_in: usize, rng: &mut R) -> Vec<f32> {
    let stddev = (1.0 / fan_in.max(1) as f32).sqrt();
    let Ok(normal) = Normal::new(0.0f32, stddev) else {
        return vec![0.0; count];
    };
    let bound = TRUNCATION * stddev;
    (0..count)
        .map(|_| loop {
            let value = normal.sample(rng);
            if value.abs() <= bound {
                break value;
            }
        })
        .collect()
}

/// 2D convolution with valid padding followed by ReLU.
///
/// Kernel layout is `[kernel_h, kernel_w, in_channels, filters]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conv2d {
    pub kernel: Array4<f32>,
    pub bias: Array1<f32>,
    pub stride: usize,
}

/// Gradients of a [`Conv2d`] layer.
pub struct Conv2dGradients {
    pub input: Array4<f32>,
    pub kernel: Array4<f32>,
    pub bias: Array1<f32>,
}

impl Conv2d {
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        filters: usize,
        kernel_size: usize,
        stride: usize,
        rng: &mut R,
    ) -> Self {
        let fan_in = kernel_size * kernel_size * in_channels;
        let values = variance_scaling(fan_in * filters, fan_in, rng);
        let kernel = Array4::from_shape_vec((kernel_size, kernel_size, in_channels, filters), values)
            .unwrap_or_else(|_| Array4::zeros((kernel_size, kernel_size, in_channels, filters)));
        Self {
            kernel,
            bias: Array1::zeros(filters),
            stride: stride.max(1),
        }
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel.dim().0
    }

    pub fn in_channels(&self) -> usize {
        self.kernel.dim().2
    }

    pub fn filters(&self) -> usize {
        self.kernel.dim().3
    }

    /// Spatial output side for an input side.
    pub fn output_side(&self, input_side: usize) -> usize {
        (input_side.saturating_sub(self.kernel_size())) / self.stride + 1
    }

    /// ReLU(conv(input) + bias), one rayon task per sample.
    pub fn forward(&self, input: &Array4<f32>) -> Array4<f32> {
        let (n, h, w, _) = input.dim();
        let (out_h, out_w) = (self.output_side(h), self.output_side(w));
        let mut output = Array4::<f32>::zeros((n, out_h, out_w, self.filters()));

        output
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(input.axis_iter(Axis(0)).into_par_iter())
            .for_each(|(out, sample)| self.forward_sample(sample, out));

        output
    }

    fn forward_sample(&self, input: ArrayView3<'_, f32>, mut output: ArrayViewMut3<'_, f32>) {
        let (k, _, in_channels, filters) = self.kernel.dim();
        let (out_h, out_w, _) = output.dim();

        for y in 0..out_h {
            for x in 0..out_w {
                let mut acc = self.bias.to_vec();
                for ky in 0..k {
                    for kx in 0..k {
                        for i in 0..in_channels {
                            let v = input[[y * self.stride + ky, x * self.stride + kx, i]];
                            if v == 0.0 {
                                continue;
                            }
                            let taps = self.kernel.slice(s![ky, kx, i, ..]);
                            for (a, &t) in acc.iter_mut().zip(taps.iter()) {
                                *a += v * t;
                            }
                        }
                    }
                }
                for o in 0..filters {
                    output[[y, x, o]] = acc[o].max(0.0);
                }
            }
        }
    }

    /// Backward pass from the gradient w.r.t. the activated output.
    ///
    /// Samples are processed in parallel; kernel and bias gradients are summed
    /// over the batch.
    pub fn backward(
        &self,
        input: &Array4<f32>,
        output: &Array4<f32>,
        grad_output: &Array4<f32>,
    ) -> Conv2dGradients {
        let mut grad_input = Array4::<f32>::zeros(input.raw_dim());
        let zero = || {
            (
                Array4::<f32>::zeros(self.kernel.raw_dim()),
                Array1::<f32>::zeros(self.filters()),
            )
        };

        let (grad_kernel, grad_bias) = grad_input
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(input.axis_iter(Axis(0)).into_par_iter())
            .zip(output.axis_iter(Axis(0)).into_par_iter())
            .zip(grad_output.axis_iter(Axis(0)).into_par_iter())
            .map(|(((grad_in, x), y), g)| {
                let (mut kernel, mut bias) = zero();
                self.backward_sample(x, y, g, grad_in, &mut kernel, &mut bias);
                (kernel, bias)
            })
            .reduce(zero, |(mut kernel, mut bias), (k, b)| {
                kernel += &k;
                bias += &b;
                (kernel, bias)
            });

        Conv2dGradients {
            input: grad_input,
            kernel: grad_kernel,
            bias: grad_bias,
        }
    }

    fn backward_sample(
        &self,
        input: ArrayView3<'_, f32>,
        output: ArrayView3<'_, f32>,
        grad_output: ArrayView3<'_, f32>,
        mut grad_input: ArrayViewMut3<'_, f32>,
        grad_kernel: &mut Array4<f32>,
        grad_bias: &mut Array1<f32>,
    ) {
        let (k, _, in_channels, filters) = self.kernel.dim();
        let (out_h, out_w, _) = output.dim();

        for y in 0..out_h {
            for x in 0..out_w {
                for o in 0..filters {
                    // ReLU passes gradient only where the unit fired
                    if output[[y, x, o]] <= 0.0 {
                        continue;
                    }
                    let g = grad_output[[y, x, o]];
                    if g == 0.0 {
                        continue;
                    }
                    grad_bias[o] += g;
                    for ky in 0..k {
                        for kx in 0..k {
                            let iy = y * self.stride + ky;
                            let ix = x * self.stride + kx;
                            for i in 0..in_channels {
                                grad_kernel[[ky, kx, i, o]] += input[[iy, ix, i]] * g;
                                grad_input[[iy, ix, i]] += self.kernel[[ky, kx, i, o]] * g;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Max pooling with a square window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxPool2d {
    pub pool: usize,
    pub stride: usize,
}

/// Pooled values plus the input position each one was taken from.
pub struct PoolOutput {
    pub values: Array4<f32>,
    argmax: Array4<(usize, usize)>,
}

impl MaxPool2d {
    pub fn new(pool: usize, stride: usize) -> Self {
        Self {
            pool: pool.max(1),
            stride: stride.max(1),
        }
    }

    pub fn output_side(&self, input_side: usize) -> usize {
        if input_side < self.pool {
            0
        } else {
            (input_side - self.pool) / self.stride + 1
        }
    }

    /// Window maximum; ties keep the first position in row-major order.
    pub fn forward(&self, input: &Array4<f32>) -> PoolOutput {
        let (n, h, w, c) = input.dim();
        let (out_h, out_w) = (self.output_side(h), self.output_side(w));
        let mut values = Array4::<f32>::zeros((n, out_h, out_w, c));
        let mut argmax = Array4::<(usize, usize)>::from_elem((n, out_h, out_w, c), (0, 0));

        for b in 0..n {
            for y in 0..out_h {
                for x in 0..out_w {
                    for ch in 0..c {
                        let (y0, x0) = (y * self.stride, x * self.stride);
                        let mut best = f32::NEG_INFINITY;
                        let mut at = (y0, x0);
                        for py in y0..y0 + self.pool {
                            for px in x0..x0 + self.pool {
                                let v = input[[b, py, px, ch]];
                                if v > best {
                                    best = v;
                                    at = (py, px);
                                }
                            }
                        }
                        values[[b, y, x, ch]] = best;
                        argmax[[b, y, x, ch]] = at;
                    }
                }
            }
        }

        PoolOutput { values, argmax }
    }

    /// Routes each output gradient back to the position that won the window.
    pub fn backward(
        &self,
        input_dim: (usize, usize, usize, usize),
        output: &PoolOutput,
        grad_output: &Array4<f32>,
    ) -> Array4<f32> {
        let mut grad_input = Array4::<f32>::zeros(input_dim);
        for ((b, y, x, ch), &(py, px)) in output.argmax.indexed_iter() {
            grad_input[[b, py, px, ch]] += grad_output[[b, y, x, ch]];
        }
        grad_input
    }
}

/// Fully connected layer producing logits; weights are `[inputs, units]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

/// Gradients of a [`Dense`] layer.
pub struct DenseGradients {
    pub input: Array2<f32>,
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(inputs: usize, units: usize, rng: &mut R) -> Self {
        let values = variance_scaling(inputs * units, inputs, rng);
        let weights = Array2::from_shape_vec((inputs, units), values)
            .unwrap_or_else(|_| Array2::zeros((inputs, units)));
        Self {
            weights,
            bias: Array1::zeros(units),
        }
    }

    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn units(&self) -> usize {
        self.weights.ncols()
    }

    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        input.dot(&self.weights) + &self.bias
    }

    pub fn backward(&self, input: &Array2<f32>, grad_logits: &Array2<f32>) -> DenseGradients {
        DenseGradients {
            input: grad_logits.dot(&self.weights.t()),
            weights: input.t().dot(grad_logits),
            bias: grad_logits.sum_axis(Axis(0)),
        }
    }
}

/// Row-wise numerically stable softmax.
pub fn softmax(logits: &Array2<f32>) -> Array2<f32> {
    let mut probs = logits.clone();
    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    probs
}
