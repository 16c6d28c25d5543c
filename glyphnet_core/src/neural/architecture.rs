//! Layer descriptor of the glyph classifier.
//!
//! The network shape is fixed apart from the input side `S` and the class
//! count `C`. The descriptor is persisted with every checkpoint and compared
//! on load, so a file written for one alphabet or sample size is never
//! silently applied to another.

use serde::{Deserialize, Serialize};

use crate::error::{LearnerError, Result};

/// Smallest input side for which both conv/pool stages keep a non-empty map.
pub const MIN_SAMPLE_SIZE: usize = 16;

pub const KERNEL_SIZE: usize = 5;
pub const CONV1_FILTERS: usize = 8;
pub const CONV2_FILTERS: usize = 16;
pub const POOL_SIZE: usize = 2;

/// Layer names, in forward order. Parameter tensors are keyed `<layer>/<kind>`.
pub const LAYER_NAMES: [&str; 6] = [
    "conv2d_1",
    "max_pooling2d_1",
    "conv2d_2",
    "max_pooling2d_2",
    "flatten",
    "dense",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Softmax,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerSpec {
    Conv2d {
        filters: usize,
        kernel_size: usize,
        stride: usize,
        activation: Activation,
    },
    MaxPool2d {
        pool: usize,
        stride: usize,
    },
    Flatten,
    Dense {
        units: usize,
        activation: Activation,
    },
}

/// Complete description of the network for an `S×S×1` input and `C` classes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    pub input_size: usize,
    pub num_classes: usize,
    pub layers: Vec<LayerSpec>,
}

impl Architecture {
    /// conv(8, 5×5) → pool(2) → conv(16, 5×5) → pool(2) → flatten → dense(C).
    ///
    /// # Errors
    ///
    /// [`LearnerError::InvalidArchitecture`] when `input_size` is below
    /// [`MIN_SAMPLE_SIZE`] or `num_classes` is zero.
    pub fn standard(input_size: usize, num_classes: usize) -> Result<Self> {
        if input_size < MIN_SAMPLE_SIZE {
            return Err(LearnerError::InvalidArchitecture(format!(
                "input side {input_size} is below the minimum of {MIN_SAMPLE_SIZE}"
            )));
        }
        if num_classes == 0 {
            return Err(LearnerError::InvalidArchitecture(
                "at least one output class is required".to_string(),
            ));
        }

        let conv = |filters| LayerSpec::Conv2d {
            filters,
            kernel_size: KERNEL_SIZE,
            stride: 1,
            activation: Activation::Relu,
        };
        let pool = LayerSpec::MaxPool2d {
            pool: POOL_SIZE,
            stride: POOL_SIZE,
        };

        Ok(Self {
            input_size,
            num_classes,
            layers: vec![
                conv(CONV1_FILTERS),
                pool.clone(),
                conv(CONV2_FILTERS),
                pool,
                LayerSpec::Flatten,
                LayerSpec::Dense {
                    units: num_classes,
                    activation: Activation::Softmax,
                },
            ],
        })
    }

    /// Per-layer output shape, batch dimension excluded.
    pub fn output_shapes(&self) -> Vec<Vec<usize>> {
        let mut side = self.input_size;
        let mut channels = 1;

        self.layers
            .iter()
            .map(|layer| match *layer {
                LayerSpec::Conv2d {
                    filters,
                    kernel_size,
                    stride,
                    ..
                } => {
                    side = side.saturating_sub(kernel_size) / stride.max(1) + 1;
                    channels = filters;
                    vec![side, side, channels]
                }
                LayerSpec::MaxPool2d { pool, stride } => {
                    side = side.saturating_sub(pool) / stride.max(1) + 1;
                    vec![side, side, channels]
                }
                LayerSpec::Flatten => vec![side * side * channels],
                LayerSpec::Dense { units, .. } => vec![units],
            })
            .collect()
    }

    /// Width of the flattened feature vector fed into the dense layer.
    pub fn feature_count(&self) -> usize {
        let (side, channels) = self.final_feature_map();
        side * side * channels
    }

    /// Side and channel count of the last pooled feature map.
    pub fn final_feature_map(&self) -> (usize, usize) {
        self.output_shapes()
            .iter()
            .rev()
            .find(|shape| shape.len() == 3)
            .map(|shape| (shape[0], shape[2]))
            .unwrap_or((self.input_size, 1))
    }
}
