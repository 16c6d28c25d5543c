//! Stroke capture and rasterization.
//!
//! Pointer input is rendered onto a [`DrawingSurface`] with wide round-capped
//! strokes, and [`rasterize`] area-averages the whole surface down to a fixed
//! `S×S` [`BitmapSample`](crate::BitmapSample). No cropping to the ink bounding
//! box happens anywhere, so off-center drawings stay off-center.

pub mod resample;
pub mod stroke;
pub mod surface;

pub use resample::{area_resample, rasterize};
pub use stroke::{Point, StrokePath};
pub use surface::{DrawingSurface, DEFAULT_STROKE_WIDTH};
