use ndarray::{Array2, ArrayView2};

use crate::raster::surface::DrawingSurface;
use crate::tensor::BitmapSample;

/// Overlap of each target cell with the source pixels along one axis.
///
/// Entry `t` lists `(source index, overlap length)` for target cell `t`;
/// overlaps of one cell always sum to `source_len / target_len`.
fn axis_weights(source_len: usize, target_len: usize) -> Vec<Vec<(usize, f32)>> {
    let scale = source_len as f64 / target_len as f64;
    (0..target_len)
        .map(|t| {
            let start = t as f64 * scale;
            let end = (t + 1) as f64 * scale;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(source_len);
            (first..last)
                .filter_map(|s| {
                    let overlap = end.min((s + 1) as f64) - start.max(s as f64);
                    (overlap > 0.0).then_some((s, overlap as f32))
                })
                .collect()
        })
        .collect()
}

/// Area-averaging resample of a full grid to `size×size`.
///
/// Each output cell is the mean of the source area it covers, with partial
/// pixels weighted by their overlap. Works in both directions, and non-square
/// sources are stretched, never cropped.
pub fn area_resample(source: ArrayView2<'_, f32>, size: usize) -> Array2<f32> {
    let (height, width) = source.dim();
    if height == 0 || width == 0 || size == 0 {
        return Array2::zeros((size, size));
    }

    let rows = axis_weights(height, size);
    let cols = axis_weights(width, size);
    let cell_area = (height as f32 / size as f32) * (width as f32 / size as f32);

    Array2::from_shape_fn((size, size), |(r, c)| {
        let mut total = 0.0f32;
        for &(sy, wy) in &rows[r] {
            for &(sx, wx) in &cols[c] {
                total += wy * wx * source[[sy, sx]];
            }
        }
        total / cell_area
    })
}

/// Captures the whole surface as an `size×size` bitmap sample.
///
/// A blank surface produces an all-zero sample.
///
/// # Examples
///
/// ```
/// use glyphnet_core::raster::{rasterize, DrawingSurface, Point};
///
/// let mut surface = DrawingSurface::new(300, 200, 16.0).unwrap();
/// surface.begin_stroke(Point::new(10.0, 10.0));
/// surface.extend_stroke(Point::new(290.0, 190.0));
///
/// let sample = rasterize(&surface, 28);
/// assert_eq!(sample.side(), 28);
/// assert!(sample.ink_fraction() > 0.0);
/// ```
pub fn rasterize(surface: &DrawingSurface, size: usize) -> BitmapSample {
    let coverage = surface.coverage();
    let pixels = area_resample(coverage.view(), size);
    BitmapSample::from_fn(size, |r, c| pixels[[r, c]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::stroke::Point;

    #[test]
    fn output_is_always_size_by_size() {
        for &(w, h) in &[(28, 28), (280, 280), (300, 120), (17, 93), (5, 5), (1, 1)] {
            let surface = DrawingSurface::new(w, h, 16.0).unwrap();
            let sample = rasterize(&surface, 28);
            assert_eq!(sample.side(), 28, "surface {w}x{h}");
        }
    }

    #[test]
    fn blank_surface_gives_blank_sample() {
        let surface = DrawingSurface::square(280).unwrap();
        let sample = rasterize(&surface, 28);
        assert!(sample.to_vec().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn integer_downscale_is_block_mean() {
        let source = Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as f32);
        let out = area_resample(source.view(), 2);
        assert!((out[[0, 0]] - (0.0 + 1.0 + 4.0 + 5.0) / 4.0).abs() < 1e-5);
        assert!((out[[1, 1]] - (10.0 + 11.0 + 14.0 + 15.0) / 4.0).abs() < 1e-5);
    }

    #[test]
    fn fractional_downscale_preserves_mean_intensity() {
        let source = Array2::from_shape_fn((10, 10), |(r, c)| ((r * 7 + c * 3) % 5) as f32 / 4.0);
        let out = area_resample(source.view(), 3);
        let source_mean = source.mean().unwrap();
        let out_mean = out.mean().unwrap();
        assert!((source_mean - out_mean).abs() < 1e-4);
    }

    #[test]
    fn upscale_replicates_pixels() {
        let source = Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 0.5, 0.25]).unwrap();
        let out = area_resample(source.view(), 4);
        assert_eq!(out[[0, 3]], 1.0);
        assert_eq!(out[[3, 0]], 0.5);
        assert_eq!(out[[2, 2]], 0.25);
    }

    #[test]
    fn off_center_ink_stays_off_center() {
        let mut surface = DrawingSurface::square(280).unwrap();
        surface.begin_stroke(Point::new(20.0, 20.0));
        surface.extend_stroke(Point::new(60.0, 20.0));

        let sample = rasterize(&surface, 28);
        assert!(sample.get(2, 4).unwrap() > 0.5);
        assert_eq!(sample.get(20, 20), Some(0.0));
    }

    #[test]
    fn stroke_width_survives_downsampling() {
        let mut surface = DrawingSurface::square(280).unwrap();
        surface.begin_stroke(Point::new(140.0, 40.0));
        surface.extend_stroke(Point::new(140.0, 240.0));

        let sample = rasterize(&surface, 28);
        // a 16px stroke straddling the 140px cell boundary inks 8px of each
        // neighbouring 10px column
        let weakest = (4..24)
            .map(|r| sample.get(r, 13).unwrap().min(sample.get(r, 14).unwrap()))
            .fold(f32::INFINITY, f32::min);
        assert!(weakest > 0.6);
    }
}
