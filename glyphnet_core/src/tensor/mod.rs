//! Bitmap samples produced by the rasterizer and consumed by the classifier.

pub mod bitmap;

pub use bitmap::{BitmapSample, BitmapStatistics};
