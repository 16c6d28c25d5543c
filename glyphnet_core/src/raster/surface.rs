use ndarray::Array2;
use tiny_skia::{FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::error::{LearnerError, Result};
use crate::raster::stroke::{Point, StrokePath};

/// Stroke width of the reference canvas, in surface pixels.
pub const DEFAULT_STROKE_WIDTH: f32 = 16.0;

/// Segments shorter than this are drawn as a round dot.
const DEGENERATE_SEGMENT: f32 = 1e-3;

/// An anti-aliased ink canvas fed by pointer events.
///
/// Mirrors a browser canvas configured with `lineCap = "round"` and
/// `lineJoin = "round"`: pointer down only records the anchor point, and
/// every pointer move strokes one segment from the previous point to the
/// new one. Ink coverage is read back from the alpha channel.
pub struct DrawingSurface {
    pixmap: Pixmap,
    stroke_width: f32,
    active: Option<StrokePath>,
}

impl DrawingSurface {
    /// Creates a blank surface.
    ///
    /// # Errors
    ///
    /// Returns [`LearnerError::InvalidSurface`] for zero or oversized dimensions.
    pub fn new(width: u32, height: u32, stroke_width: f32) -> Result<Self> {
        let pixmap =
            Pixmap::new(width, height).ok_or(LearnerError::InvalidSurface { width, height })?;
        Ok(Self {
            pixmap,
            stroke_width: stroke_width.max(1.0),
            active: None,
        })
    }

    /// Square surface with the reference stroke width.
    pub fn square(side: u32) -> Result<Self> {
        Self::new(side, side, DEFAULT_STROKE_WIDTH)
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn stroke_width(&self) -> f32 {
        self.stroke_width
    }

    /// Pointer down: starts a new gesture at `point` without drawing.
    pub fn begin_stroke(&mut self, point: Point) {
        let mut path = StrokePath::new();
        path.push(point);
        self.active = Some(path);
    }

    /// Pointer move: strokes from the previous point to `point`.
    ///
    /// Moves outside a gesture are ignored.
    pub fn extend_stroke(&mut self, point: Point) {
        let Some(previous) = self.active.as_ref().and_then(StrokePath::last) else {
            return;
        };
        self.draw_segment(previous, point);
        if let Some(path) = self.active.as_mut() {
            path.push(point);
        }
    }

    /// Pointer up: ends the gesture and returns its points.
    pub fn end_stroke(&mut self) -> Option<StrokePath> {
        self.active.take()
    }

    /// Renders a complete gesture in one call.
    pub fn draw_path(&mut self, path: &StrokePath) {
        for (from, to) in path.segments() {
            self.draw_segment(from, to);
        }
    }

    /// Resets the surface to blank and drops any gesture in flight.
    pub fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
        self.active = None;
    }

    /// Per-pixel ink coverage in `[0, 1]`, shaped `(height, width)`.
    pub fn coverage(&self) -> Array2<f32> {
        let width = self.pixmap.width() as usize;
        let height = self.pixmap.height() as usize;
        let alpha: Vec<f32> = self
            .pixmap
            .pixels()
            .iter()
            .map(|px| f32::from(px.alpha()) / 255.0)
            .collect();
        Array2::from_shape_vec((height, width), alpha)
            .unwrap_or_else(|_| Array2::zeros((height, width)))
    }

    pub fn is_blank(&self) -> bool {
        self.pixmap.pixels().iter().all(|px| px.alpha() == 0)
    }

    fn ink() -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color_rgba8(0, 0, 0, 255);
        paint.anti_alias = true;
        paint
    }

    fn draw_segment(&mut self, from: Point, to: Point) {
        let paint = Self::ink();
        let length = (to.x - from.x).hypot(to.y - from.y);

        if length < DEGENERATE_SEGMENT {
            if let Some(dot) = PathBuilder::from_circle(from.x, from.y, self.stroke_width / 2.0) {
                self.pixmap
                    .fill_path(&dot, &paint, FillRule::Winding, Transform::identity(), None);
            }
            return;
        }

        let mut builder = PathBuilder::new();
        builder.move_to(from.x, from.y);
        builder.line_to(to.x, to.y);
        let Some(path) = builder.finish() else {
            return;
        };

        let stroke = Stroke {
            width: self.stroke_width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}

impl std::fmt::Debug for DrawingSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawingSurface")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("stroke_width", &self.stroke_width)
            .field("stroking", &self.active.is_some())
            .finish()
    }
}
