//! Alphabet, dataset accumulation and synthetic glyph generation.

pub mod alphabet;
pub mod dataset;
pub mod synthetic;

pub use alphabet::{Alphabet, AlphabetError};
pub use dataset::{Dataset, LabeledExample};
