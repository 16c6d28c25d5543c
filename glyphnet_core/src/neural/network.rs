//! The glyph classifier: fixed CNN over `S×S×1` bitmaps with a softmax head.

use std::path::Path;

use ndarray::{Array, Array2, Array4, Dimension};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checkpoint::{CheckpointError, Checkpointable};
use crate::error::{LearnerError, Result};
use crate::neural::architecture::{
    Architecture, CONV1_FILTERS, CONV2_FILTERS, KERNEL_SIZE, LAYER_NAMES, POOL_SIZE,
};
use crate::neural::layer::{softmax, Conv2d, Dense, MaxPool2d, PoolOutput};
use crate::neural::loss::{accuracy, categorical_cross_entropy};
use crate::neural::optimizer::{AdamOptimizer, DEFAULT_LEARNING_RATE};

const CLASSIFIER_CHECKPOINT_VERSION: u32 = 1;

/// Construction parameters for a [`Classifier`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub sample_size: usize,
    pub num_classes: usize,
    pub seed: u64,
    pub learning_rate: f32,
}

impl ClassifierConfig {
    pub fn new(sample_size: usize, num_classes: usize) -> Self {
        Self {
            sample_size,
            num_classes,
            seed: 42,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }
}

/// A parameter tensor flattened in row-major order under its layer name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl ParameterTensor {
    fn capture<D: Dimension>(name: String, array: &Array<f32, D>) -> Self {
        Self {
            name,
            shape: array.shape().to_vec(),
            values: array.iter().copied().collect(),
        }
    }

    fn restore_into<D: Dimension>(
        &self,
        target: &mut Array<f32, D>,
    ) -> std::result::Result<(), CheckpointError> {
        if self.shape != target.shape() || self.values.len() != target.len() {
            return Err(CheckpointError::InvalidFormat(format!(
                "parameter '{}' has shape {:?}, expected {:?}",
                self.name,
                self.shape,
                target.shape()
            )));
        }
        target
            .iter_mut()
            .zip(&self.values)
            .for_each(|(slot, &value)| *slot = value);
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct ClassifierCheckpoint {
    version: u32,
    architecture: Architecture,
    learning_rate: f32,
    parameters: Vec<ParameterTensor>,
}

/// Activations kept from one forward pass for backpropagation.
struct ForwardTrace {
    conv1: Array4<f32>,
    pool1: PoolOutput,
    conv2: Array4<f32>,
    pool2: PoolOutput,
    features: Array2<f32>,
    probabilities: Array2<f32>,
}

/// Convolutional classifier mapping bitmaps to a probability per class.
///
/// A freshly built classifier is compiled (optimizer attached) but untrained.
/// A classifier restored from a checkpoint is trained but uncompiled until
/// [`Classifier::compile`] is called.
#[derive(Clone, Debug)]
pub struct Classifier {
    architecture: Architecture,
    conv1: Conv2d,
    pool1: MaxPool2d,
    conv2: Conv2d,
    pool2: MaxPool2d,
    dense: Dense,
    learning_rate: f32,
    optimizer: Option<AdamOptimizer>,
    trained: bool,
}

impl Classifier {
    /// Builds and compiles a classifier with freshly initialized weights.
    ///
    /// # Errors
    ///
    /// [`LearnerError::InvalidArchitecture`] for inputs smaller than
    /// [`MIN_SAMPLE_SIZE`](crate::neural::MIN_SAMPLE_SIZE) or zero classes.
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let architecture = Architecture::standard(config.sample_size, config.num_classes)?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let conv1 = Conv2d::new(1, CONV1_FILTERS, KERNEL_SIZE, 1, &mut rng);
        let conv2 = Conv2d::new(CONV1_FILTERS, CONV2_FILTERS, KERNEL_SIZE, 1, &mut rng);
        let dense = Dense::new(architecture.feature_count(), config.num_classes, &mut rng);

        let mut classifier = Self {
            architecture,
            conv1,
            pool1: MaxPool2d::new(POOL_SIZE, POOL_SIZE),
            conv2,
            pool2: MaxPool2d::new(POOL_SIZE, POOL_SIZE),
            dense,
            learning_rate: config.learning_rate,
            optimizer: None,
            trained: false,
        };
        classifier.compile();

        debug!(
            sample_size = config.sample_size,
            num_classes = config.num_classes,
            parameters = classifier.parameter_count(),
            "classifier built"
        );
        Ok(classifier)
    }

    /// Attaches categorical cross-entropy and a fresh Adam optimizer.
    pub fn compile(&mut self) {
        self.optimizer = Some(AdamOptimizer::new(self.learning_rate));
    }

    pub fn is_compiled(&self) -> bool {
        self.optimizer.is_some()
    }

    /// True once at least one fit completed or weights were loaded.
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn mark_trained(&mut self) {
        self.trained = true;
    }

    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    pub fn sample_size(&self) -> usize {
        self.architecture.input_size
    }

    pub fn num_classes(&self) -> usize {
        self.architecture.num_classes
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Optimization steps taken since the last compile.
    pub fn optimizer_steps(&self) -> u32 {
        self.optimizer.as_ref().map_or(0, AdamOptimizer::steps)
    }

    pub fn parameter_count(&self) -> usize {
        self.conv1.kernel.len()
            + self.conv1.bias.len()
            + self.conv2.kernel.len()
            + self.conv2.bias.len()
            + self.dense.weights.len()
            + self.dense.bias.len()
    }

    /// Layer table in the usual `name  output shape  params` layout.
    pub fn summary(&self) -> String {
        let params = [
            self.conv1.kernel.len() + self.conv1.bias.len(),
            0,
            self.conv2.kernel.len() + self.conv2.bias.len(),
            0,
            0,
            self.dense.weights.len() + self.dense.bias.len(),
        ];
        let mut out = format!("{:<18}{:<18}{:>8}\n", "Layer", "Output Shape", "Param #");
        for ((name, shape), count) in LAYER_NAMES
            .iter()
            .zip(self.architecture.output_shapes())
            .zip(params)
        {
            out.push_str(&format!("{:<18}{:<18}{:>8}\n", name, format!("{shape:?}"), count));
        }
        out.push_str(&format!("Total params: {}\n", self.parameter_count()));
        out
    }

    /// Class probabilities for an `N×S×S×1` batch; each row sums to 1.
    pub fn predict_proba(&self, batch: &Array4<f32>) -> Result<Array2<f32>> {
        self.check_batch(batch)?;
        Ok(self.forward(batch).probabilities)
    }

    /// Fraction of `labels` matched by the decoded predictions for `batch`.
    pub fn evaluate(&self, batch: &Array4<f32>, labels: &[usize]) -> Result<f32> {
        let probabilities = self.predict_proba(batch)?;
        Ok(accuracy(&probabilities, labels))
    }

    /// One full-batch gradient step; returns the loss before the update.
    ///
    /// # Errors
    ///
    /// [`LearnerError::NotCompiled`] without an optimizer and
    /// [`LearnerError::ShapeMismatch`] when inputs and targets disagree with
    /// the architecture or each other.
    pub fn train_step(&mut self, inputs: &Array4<f32>, targets: &Array2<f32>) -> Result<f32> {
        if self.optimizer.is_none() {
            return Err(LearnerError::NotCompiled);
        }
        self.check_batch(inputs)?;
        let expected = [inputs.dim().0, self.num_classes()];
        if targets.shape() != expected {
            return Err(LearnerError::ShapeMismatch {
                context: "training targets",
                expected: expected.to_vec(),
                found: targets.shape().to_vec(),
            });
        }

        let trace = self.forward(inputs);
        let (loss, grad_logits) = categorical_cross_entropy(&trace.probabilities, targets);

        let dense_grads = self.dense.backward(&trace.features, &grad_logits);
        let grad_pool2 = Self::unflatten(&dense_grads.input, trace.pool2.values.dim());
        let grad_conv2 = self
            .pool2
            .backward(trace.conv2.dim(), &trace.pool2, &grad_pool2);
        let conv2_grads = self
            .conv2
            .backward(&trace.pool1.values, &trace.conv2, &grad_conv2);
        let grad_conv1 = self
            .pool1
            .backward(trace.conv1.dim(), &trace.pool1, &conv2_grads.input);
        let conv1_grads = self.conv1.backward(inputs, &trace.conv1, &grad_conv1);

        let Some(optimizer) = self.optimizer.as_mut() else {
            return Err(LearnerError::NotCompiled);
        };
        optimizer.begin_step();
        optimizer.update("conv2d_1/kernel", &mut self.conv1.kernel, &conv1_grads.kernel);
        optimizer.update("conv2d_1/bias", &mut self.conv1.bias, &conv1_grads.bias);
        optimizer.update("conv2d_2/kernel", &mut self.conv2.kernel, &conv2_grads.kernel);
        optimizer.update("conv2d_2/bias", &mut self.conv2.bias, &conv2_grads.bias);
        optimizer.update("dense/kernel", &mut self.dense.weights, &dense_grads.weights);
        optimizer.update("dense/bias", &mut self.dense.bias, &dense_grads.bias);

        Ok(loss)
    }

    /// Every trainable tensor, keyed by `<layer>/<kind>`.
    pub fn parameters(&self) -> Vec<ParameterTensor> {
        vec![
            ParameterTensor::capture("conv2d_1/kernel".into(), &self.conv1.kernel),
            ParameterTensor::capture("conv2d_1/bias".into(), &self.conv1.bias),
            ParameterTensor::capture("conv2d_2/kernel".into(), &self.conv2.kernel),
            ParameterTensor::capture("conv2d_2/bias".into(), &self.conv2.bias),
            ParameterTensor::capture("dense/kernel".into(), &self.dense.weights),
            ParameterTensor::capture("dense/bias".into(), &self.dense.bias),
        ]
    }

    /// Overwrites weights from named tensors. Every tensor must be present with
    /// its exact shape; nothing is modified on error.
    pub fn set_parameters(
        &mut self,
        parameters: &[ParameterTensor],
    ) -> std::result::Result<(), CheckpointError> {
        let mut staged = self.clone();
        for name in [
            "conv2d_1/kernel",
            "conv2d_1/bias",
            "conv2d_2/kernel",
            "conv2d_2/bias",
            "dense/kernel",
            "dense/bias",
        ] {
            let tensor = parameters
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| {
                    CheckpointError::InvalidFormat(format!("missing parameter '{name}'"))
                })?;
            match name {
                "conv2d_1/kernel" => tensor.restore_into(&mut staged.conv1.kernel)?,
                "conv2d_1/bias" => tensor.restore_into(&mut staged.conv1.bias)?,
                "conv2d_2/kernel" => tensor.restore_into(&mut staged.conv2.kernel)?,
                "conv2d_2/bias" => tensor.restore_into(&mut staged.conv2.bias)?,
                "dense/kernel" => tensor.restore_into(&mut staged.dense.weights)?,
                _ => tensor.restore_into(&mut staged.dense.bias)?,
            }
        }
        *self = staged;
        Ok(())
    }

    fn check_batch(&self, batch: &Array4<f32>) -> Result<()> {
        let (n, h, w, c) = batch.dim();
        let s = self.sample_size();
        if (h, w, c) != (s, s, 1) {
            return Err(LearnerError::ShapeMismatch {
                context: "model input",
                expected: vec![n, s, s, 1],
                found: vec![n, h, w, c],
            });
        }
        Ok(())
    }

    fn forward(&self, input: &Array4<f32>) -> ForwardTrace {
        let conv1 = self.conv1.forward(input);
        let pool1 = self.pool1.forward(&conv1);
        let conv2 = self.conv2.forward(&pool1.values);
        let pool2 = self.pool2.forward(&conv2);
        let features = Self::flatten(&pool2.values);
        let probabilities = softmax(&self.dense.forward(&features));

        ForwardTrace {
            conv1,
            pool1,
            conv2,
            pool2,
            features,
            probabilities,
        }
    }

    /// `N×H×W×C` to `N×(H·W·C)`, channels fastest.
    fn flatten(maps: &Array4<f32>) -> Array2<f32> {
        let (n, _, w, c) = maps.dim();
        let features = maps.len() / n.max(1);
        Array2::from_shape_fn((n, features), |(b, i)| {
            maps[[b, i / (w * c), (i / c) % w, i % c]]
        })
    }

    fn unflatten(grad: &Array2<f32>, dim: (usize, usize, usize, usize)) -> Array4<f32> {
        let (_, _, w, c) = dim;
        Array4::from_shape_fn(dim, |(b, y, x, ch)| grad[[b, (y * w + x) * c + ch]])
    }
}

impl Checkpointable for Classifier {
    fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), CheckpointError> {
        let snapshot = ClassifierCheckpoint {
            version: CLASSIFIER_CHECKPOINT_VERSION,
            architecture: self.architecture.clone(),
            learning_rate: self.learning_rate,
            parameters: self.parameters(),
        };
        Self::write_snapshot(&snapshot, path)
    }

    fn load_checkpoint<P: AsRef<Path>>(path: P) -> std::result::Result<Self, CheckpointError> {
        let snapshot: ClassifierCheckpoint = Self::read_snapshot(path)?;
        if snapshot.version != CLASSIFIER_CHECKPOINT_VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: CLASSIFIER_CHECKPOINT_VERSION,
                found: snapshot.version,
            });
        }

        let stored = &snapshot.architecture;
        let expected = Architecture::standard(stored.input_size, stored.num_classes)
            .map_err(|err| CheckpointError::InvalidFormat(err.to_string()))?;
        if expected != *stored {
            return Err(CheckpointError::InvalidFormat(format!(
                "unsupported layer layout: {:?}",
                stored.layers
            )));
        }

        let config = ClassifierConfig::new(stored.input_size, stored.num_classes)
            .with_learning_rate(snapshot.learning_rate);
        let mut classifier =
            Classifier::new(&config).map_err(|err| CheckpointError::InvalidFormat(err.to_string()))?;
        classifier.set_parameters(&snapshot.parameters)?;
        classifier.optimizer = None;
        classifier.trained = true;
        Ok(classifier)
    }
}
