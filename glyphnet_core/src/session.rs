//! Interactive capture loop: prompt a symbol, draw it, store it, repeat.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::config::LearnerConfig;
use crate::data::{Alphabet, Dataset};
use crate::error::Result;
use crate::handle::ModelHandle;
use crate::predict::{predict, Prediction};
use crate::raster::{rasterize, DrawingSurface, Point};
use crate::tensor::BitmapSample;

/// A drawing surface, the samples captured from it and the current prompt.
///
/// The prompted symbol is the label of the next capture. Capturing clears the
/// surface and draws a new prompt uniformly from the alphabet.
#[derive(Debug)]
pub struct CaptureSession {
    surface: DrawingSurface,
    dataset: Dataset,
    alphabet: Alphabet,
    target: usize,
    rng: StdRng,
}

impl CaptureSession {
    pub fn new(surface: DrawingSurface, alphabet: Alphabet, sample_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let target = alphabet.random_label(&mut rng);
        let dataset = Dataset::new(sample_size, alphabet.len());
        Self {
            surface,
            dataset,
            alphabet,
            target,
            rng,
        }
    }

    pub fn from_config(config: &LearnerConfig) -> Result<Self> {
        let surface = DrawingSurface::new(
            config.canvas.width,
            config.canvas.height,
            config.canvas.stroke_width,
        )?;
        let alphabet = config.alphabet()?;
        Ok(Self::new(
            surface,
            alphabet,
            config.model.sample_size,
            config.model.seed,
        ))
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut DrawingSurface {
        &mut self.surface
    }

    /// Label the next capture will be stored under.
    pub fn target(&self) -> usize {
        self.target
    }

    pub fn target_symbol(&self) -> Option<char> {
        self.alphabet.symbol(self.target)
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.surface.begin_stroke(Point::new(x, y));
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.surface.extend_stroke(Point::new(x, y));
    }

    pub fn pointer_up(&mut self) {
        self.surface.end_stroke();
    }

    /// Current drawing as a bitmap, without storing it.
    pub fn snapshot(&self) -> BitmapSample {
        rasterize(&self.surface, self.dataset.sample_size())
    }

    /// Stores the drawing under the current prompt, clears the surface and
    /// picks the next prompt. Returns the label that was stored.
    pub fn capture(&mut self) -> Result<usize> {
        let label = self.target;
        self.dataset.append(self.snapshot(), label)?;
        self.surface.clear();
        self.target = self.alphabet.random_label(&mut self.rng);
        debug!(
            label,
            next = self.target,
            samples = self.dataset.len(),
            "sample captured"
        );
        Ok(label)
    }

    /// Discards the drawing without storing it; the prompt stays.
    pub fn clear(&mut self) {
        self.surface.clear();
    }

    /// Classifies the current drawing and clears the surface.
    pub fn recognize(&mut self, handle: &ModelHandle) -> Result<Prediction> {
        let prediction = predict(handle, &self.snapshot())?;
        self.surface.clear();
        Ok(prediction)
    }

    /// Drops every captured sample and the drawing in progress.
    pub fn reset(&mut self) {
        self.dataset.reset();
        self.surface.clear();
    }

    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }
}
