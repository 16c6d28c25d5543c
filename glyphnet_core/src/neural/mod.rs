//! Neural network components of the glyph classifier.
//!
//! Layers operate on `ndarray` batches in NHWC order. The [`Classifier`]
//! wires them into the fixed conv/pool/dense stack described by
//! [`Architecture`] and trains it with [`AdamOptimizer`].

pub mod architecture;
pub mod layer;
pub mod loss;
pub mod network;
pub mod optimizer;

pub use architecture::{Activation, Architecture, LayerSpec, MIN_SAMPLE_SIZE};
pub use layer::{softmax, Conv2d, Dense, MaxPool2d};
pub use loss::{accuracy, categorical_cross_entropy};
pub use network::{Classifier, ClassifierConfig, ParameterTensor};
pub use optimizer::AdamOptimizer;
