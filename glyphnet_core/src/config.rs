//! Learner configuration via TOML files.
//!
//! Every section and key is optional; missing values fall back to the
//! defaults of the reference drawing trainer (28×28 samples, the 26 Latin
//! capitals, 1000 epochs of Adam at 0.001, 16 px round strokes).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::{Alphabet, AlphabetError};
use crate::neural::ClassifierConfig;

/// Errors produced while reading configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("invalid config value for alphabet.symbols: {0}")]
    Alphabet(#[from] AlphabetError),
}

/// Full learner configuration loaded from TOML.
///
/// # Examples
///
/// ```
/// use glyphnet_core::LearnerConfig;
///
/// let config = LearnerConfig::from_str("[training]\nepochs = 50\n").unwrap();
/// assert_eq!(config.training.epochs, 50);
/// assert_eq!(config.model.sample_size, 28);
/// assert_eq!(config.num_classes(), 26);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub model: ModelConfig,
    pub training: TrainingSettings,
    pub canvas: CanvasConfig,
    pub alphabet: AlphabetConfig,
    pub storage: StorageConfig,
}

/// `[model]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Side length S of every bitmap sample.
    pub sample_size: usize,
    /// Seed for variance-scaling initialization.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sample_size: 28,
            seed: 42,
        }
    }
}

/// `[training]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub epochs: usize,
    pub learning_rate: f32,
    /// Optional JSON-lines file receiving one record per epoch.
    pub epoch_log: Option<PathBuf>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            epochs: 1000,
            learning_rate: 0.001,
            epoch_log: None,
        }
    }
}

/// `[canvas]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub stroke_width: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 280,
            height: 280,
            stroke_width: 16.0,
        }
    }
}

/// `[alphabet]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphabetConfig {
    pub symbols: String,
}

impl Default for AlphabetConfig {
    fn default() -> Self {
        Self {
            symbols: crate::data::alphabet::LATIN_UPPERCASE.to_string(),
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: PathBuf,
    pub slot: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            slot: "model".to_string(),
        }
    }
}

impl LearnerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path)?;
        Self::from_str(&contents)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of output classes C, derived from the alphabet.
    pub fn num_classes(&self) -> usize {
        self.alphabet.symbols.chars().count()
    }

    /// Classifier construction parameters for this alphabet and sample size.
    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig::new(self.model.sample_size, self.num_classes())
            .with_seed(self.model.seed)
            .with_learning_rate(self.training.learning_rate)
    }

    pub fn alphabet(&self) -> Result<Alphabet, ConfigError> {
        Ok(Alphabet::new(&self.alphabet.symbols)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.sample_size < crate::neural::MIN_SAMPLE_SIZE {
            return Err(ConfigError::Invalid {
                key: "model.sample_size",
                reason: format!(
                    "must be at least {}, got {}",
                    crate::neural::MIN_SAMPLE_SIZE,
                    self.model.sample_size
                ),
            });
        }
        if !(self.training.learning_rate > 0.0 && self.training.learning_rate.is_finite()) {
            return Err(ConfigError::Invalid {
                key: "training.learning_rate",
                reason: "must be a positive finite number".into(),
            });
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Invalid {
                key: "canvas",
                reason: "width and height must be non-zero".into(),
            });
        }
        if self.canvas.stroke_width <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "canvas.stroke_width",
                reason: "must be positive".into(),
            });
        }
        self.alphabet()?;
        Ok(())
    }
}
