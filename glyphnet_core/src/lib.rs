//! # Glyphnet Core
//!
//! Teach a small convolutional classifier to recognize hand-drawn symbols.
//! Strokes drawn on a [`DrawingSurface`] are area-averaged into fixed-size
//! [`BitmapSample`]s, collected under the prompted label in a [`Dataset`],
//! fitted with a fixed conv/pool/dense network and decoded back to symbols.
//!
//! ## Quick Start
//!
//! ```rust
//! use glyphnet_core::data::synthetic::generate_glyph_dataset;
//! use glyphnet_core::{fit, predict, ClassifierConfig, ModelHandle};
//!
//! let dataset = generate_glyph_dataset(2, 2, 16, 64, 7).unwrap();
//! let handle = ModelHandle::from_config(&ClassifierConfig::new(16, 2)).unwrap();
//!
//! let summary = fit(&handle, &dataset, 3, |progress| {
//!     println!("epoch {} loss {:.4}", progress.epoch, progress.loss);
//! })
//! .unwrap();
//! assert_eq!(summary.epochs_run, 3);
//!
//! let prediction = predict(&handle, &dataset.samples()[0]).unwrap();
//! assert_eq!(prediction.probabilities.len(), 2);
//! ```
//!
//! ## Core Modules
//!
//! - [`config`] - Learner configuration via TOML
//! - [`raster`] - Stroke rendering and area-averaged rasterization
//! - [`data`] - Alphabet, dataset accumulation, synthetic glyphs
//! - [`neural`] - Layers, loss, Adam and the classifier
//! - [`training`] - Epoch loop with progress callbacks
//! - [`predict`] - Inference and argmax decoding
//! - [`storage`] - Named model slots on disk
//! - [`logging`] - `tracing` setup and JSON-lines epoch logs

pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod handle;
pub mod logging;
pub mod neural;
pub mod predict;
pub mod raster;
pub mod session;
pub mod storage;
pub mod tensor;
pub mod training;

pub use checkpoint::{CheckpointError, Checkpointable};
pub use config::{ConfigError, LearnerConfig};
pub use data::{Alphabet, Dataset, LabeledExample};
pub use error::{LearnerError, Result};
pub use handle::ModelHandle;
pub use neural::{Architecture, Classifier, ClassifierConfig, MIN_SAMPLE_SIZE};
pub use predict::{predict, Prediction, UNRECOGNIZED};
pub use raster::{rasterize, DrawingSurface, Point, StrokePath};
pub use session::CaptureSession;
pub use storage::ModelStore;
pub use tensor::{BitmapSample, BitmapStatistics};
pub use training::{fit, spawn_fit, EpochProgress, Trainer, TrainingJob, TrainingSummary};
