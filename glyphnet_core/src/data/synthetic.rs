//! Synthetic glyph generation for demos, benchmarks and tests.
//!
//! Each class is a fixed stroke template in unit coordinates; samples jitter
//! the template, draw it on a [`DrawingSurface`] and rasterize the result,
//! so generated data goes through the same capture path as real drawings.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::Dataset;
use crate::error::Result;
use crate::raster::{rasterize, DrawingSurface, Point, StrokePath};

/// Stroke templates, one per synthetic class.
const TEMPLATES: &[&[&[(f32, f32)]]] = &[
    // vertical bar
    &[&[(0.5, 0.15), (0.5, 0.85)]],
    // horizontal bar
    &[&[(0.15, 0.5), (0.85, 0.5)]],
    // cross
    &[&[(0.2, 0.2), (0.8, 0.8)], &[(0.8, 0.2), (0.2, 0.8)]],
    // box
    &[&[(0.2, 0.2), (0.8, 0.2), (0.8, 0.8), (0.2, 0.8), (0.2, 0.2)]],
    // wedge
    &[&[(0.15, 0.8), (0.5, 0.2), (0.85, 0.8)]],
    // step
    &[&[(0.2, 0.2), (0.2, 0.8), (0.8, 0.8)]],
];

/// Number of distinct synthetic classes available.
pub fn template_count() -> usize {
    TEMPLATES.len()
}

/// Stroke paths for `class` on a `canvas`-pixel square, offset by up to
/// `jitter` (fraction of the canvas) per point. Negative jitter counts by
/// magnitude; non-finite jitter draws the bare template.
pub fn template_strokes<R: Rng + ?Sized>(
    class: usize,
    canvas: u32,
    jitter: f32,
    rng: &mut R,
) -> Vec<StrokePath> {
    let scale = canvas as f32;
    let jitter = if jitter.is_finite() { jitter.abs() } else { 0.0 };
    TEMPLATES[class % TEMPLATES.len()]
        .iter()
        .map(|stroke| {
            stroke
                .iter()
                .map(|&(x, y)| {
                    let dx = rng.gen_range(-jitter..=jitter);
                    let dy = rng.gen_range(-jitter..=jitter);
                    Point::new((x + dx) * scale, (y + dy) * scale)
                })
                .collect()
        })
        .collect()
}

/// Builds a dataset with `samples_per_class` jittered drawings per class.
///
/// # Examples
///
/// ```
/// use glyphnet_core::data::synthetic::generate_glyph_dataset;
///
/// let dataset = generate_glyph_dataset(3, 2, 28, 140, 42).unwrap();
/// assert_eq!(dataset.len(), 6);
/// assert_eq!(dataset.class_counts(), vec![2, 2, 2]);
/// ```
pub fn generate_glyph_dataset(
    num_classes: usize,
    samples_per_class: usize,
    sample_size: usize,
    canvas: u32,
    seed: u64,
) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut surface = DrawingSurface::new(canvas, canvas, canvas as f32 / 17.5)?;
    let mut dataset = Dataset::new(sample_size, num_classes);

    for _ in 0..samples_per_class {
        for class in 0..num_classes {
            for stroke in template_strokes(class, canvas, 0.04, &mut rng) {
                surface.draw_path(&stroke);
            }
            dataset.append(rasterize(&surface, sample_size), class)?;
            surface.clear();
        }
    }

    Ok(dataset)
}
