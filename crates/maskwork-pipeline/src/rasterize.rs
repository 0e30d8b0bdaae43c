//! Stroke set to binary mask rasterization.
//!
//! Strokes are recorded against the on-screen canvas, while the mask
//! must line up with the normalized image sent to the generation API.
//! Instead of resampling a screen-sized bitmap, [`rasterize`] scales the
//! stroke *coordinates* into the target frame and renders them there:
//!
//! ```text
//! scale_x = target.width  / canvas.width
//! scale_y = target.height / canvas.height
//! point'  = (x * scale_x, y * scale_y)
//! width'  = max(1, round(stroke_width * scale_x))
//! ```
//!
//! The line width only follows the horizontal scale. For aspect-preserving
//! targets the two scales are nearly equal; for distorted ones the brush
//! keeps its horizontal proportion.
//!
//! Background is black (keep), strokes are white (edit), with round caps
//! and joins. Rendering is aliased so the mask only holds 0 and 255.
//!
//! Before rendering, line widths are capped at [`MAX_WIDTH_DIAGONALS`]
//! target diagonals and every segment is clipped to the raster grown by
//! half the line width, so far-off or enormous strokes still paint the
//! pixels they cover.

use tiny_skia::{
    Color, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke as SkStroke, Transform,
};

use crate::types::{Dimensions, EncodedImage, GrayImage, MaskError, Point, Stroke, StrokeSet};

/// Widest line drawn, in diagonals of the target raster.
pub const MAX_WIDTH_DIAGONALS: f64 = 4.0;

/// Scaled coordinates at or beyond this magnitude cannot be differenced
/// without overflow.
const COORD_LIMIT: f64 = f64::MAX / 2.0;

/// Per-axis scale from a canvas frame to a target raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    /// Horizontal factor.
    pub x: f64,
    /// Vertical factor.
    pub y: f64,
}

impl Scale {
    /// Compute the scale from `strokes.canvas_size` to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidScale`] if either factor is not a
    /// finite positive number, which happens when the canvas was never
    /// measured (zero size) or the target is empty.
    pub fn between(strokes: &StrokeSet, target: Dimensions) -> Result<Self, MaskError> {
        let canvas = strokes.canvas_size;
        let x = f64::from(target.width) / canvas.width;
        let y = f64::from(target.height) / canvas.height;
        let valid = |s: f64| s.is_finite() && s > 0.0;
        if !valid(x) || !valid(y) {
            return Err(MaskError::InvalidScale {
                scale_x: x,
                scale_y: y,
                canvas_width: canvas.width,
                canvas_height: canvas.height,
                target,
            });
        }
        Ok(Self { x, y })
    }

    /// Line width in target pixels for a stroke width in canvas pixels.
    #[must_use]
    pub fn line_width(self, stroke_width: f64) -> f64 {
        (stroke_width * self.x).round().max(1.0)
    }
}

/// Counts gathered while rendering a stroke set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Strokes rendered. A stroke lying wholly off the raster counts
    /// here but adds no white pixels.
    pub drawn: usize,
    /// Strokes skipped for having no points or coordinates that are not
    /// finite in the target frame.
    pub skipped: usize,
    /// Pixels set to white in the output.
    pub white_pixels: u64,
}

/// Rasterize a stroke set into a PNG mask of exactly `target` pixels.
///
/// Returns `Ok(None)` when the set holds no strokes: "no mask intended",
/// which callers must keep distinct from an all-black mask.
///
/// # Errors
///
/// Returns [`MaskError::InvalidScale`] for an unmeasured canvas or an
/// empty target, and [`MaskError::Encode`] if PNG encoding fails.
pub fn rasterize(
    strokes: &StrokeSet,
    target: Dimensions,
) -> Result<Option<EncodedImage>, MaskError> {
    render(strokes, target)?
        .map(|mask| crate::types::encode_gray_png(&mask))
        .transpose()
}

/// Like [`rasterize`] but returns the raw single-channel raster.
///
/// # Errors
///
/// Returns [`MaskError::InvalidScale`] for an unmeasured canvas or an
/// empty target.
pub fn render(strokes: &StrokeSet, target: Dimensions) -> Result<Option<GrayImage>, MaskError> {
    Ok(render_with_stats(strokes, target)?.map(|(mask, _)| mask))
}

pub(crate) fn render_with_stats(
    strokes: &StrokeSet,
    target: Dimensions,
) -> Result<Option<(GrayImage, RenderStats)>, MaskError> {
    if strokes.is_empty() {
        return Ok(None);
    }
    let scale = Scale::between(strokes, target)?;
    let mut pixmap =
        Pixmap::new(target.width, target.height).ok_or(MaskError::InvalidScale {
            scale_x: scale.x,
            scale_y: scale.y,
            canvas_width: strokes.canvas_size.width,
            canvas_height: strokes.canvas_size.height,
            target,
        })?;
    pixmap.fill(Color::BLACK);

    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, 255);
    paint.anti_alias = false;

    let max_width = f64::from(target.width).hypot(f64::from(target.height)) * MAX_WIDTH_DIAGONALS;
    let mut stats = RenderStats::default();
    for stroke in &strokes.strokes {
        if draw_stroke(&mut pixmap, &paint, stroke, scale, max_width) {
            stats.drawn += 1;
        } else {
            stats.skipped += 1;
        }
    }

    let mask = to_gray(&pixmap);
    stats.white_pixels = count_white_pixels(&mask);
    Ok(Some((mask, stats)))
}

/// Draw one stroke. Returns `false` if the stroke was skipped.
#[allow(clippy::cast_possible_truncation)]
fn draw_stroke(
    pixmap: &mut Pixmap,
    paint: &Paint<'_>,
    stroke: &Stroke,
    scale: Scale,
    max_width: f64,
) -> bool {
    let points: Vec<Point> = stroke
        .points()
        .iter()
        .map(|p| p.scaled(scale.x, scale.y))
        .collect();
    let Some(&first) = points.first() else {
        return false;
    };
    if !points.iter().all(|p| p.x.abs() < COORD_LIMIT && p.y.abs() < COORD_LIMIT) {
        return false;
    }
    let width = scale.line_width(stroke.stroke_width).min(max_width);
    let window = Window::around(pixmap, width);

    // A zero-length round-capped segment renders as a dot.
    if points.iter().all(|&p| p == first) {
        if !window.contains(first) {
            return true;
        }
        let radius = (width / 2.0) as f32;
        if let Some(dot) = PathBuilder::from_circle(first.x as f32, first.y as f32, radius) {
            pixmap.fill_path(&dot, paint, FillRule::Winding, Transform::identity(), None);
        }
        return true;
    }

    // Each segment becomes its own round-capped subpath; the caps of
    // neighbouring segments cover the round join between them.
    let mut pb = PathBuilder::new();
    for pair in points.windows(2) {
        if pair[0] == pair[1] {
            continue;
        }
        if let Some((a, b)) = window.clip(pair[0], pair[1]) {
            pb.move_to(a.x as f32, a.y as f32);
            pb.line_to(b.x as f32, b.y as f32);
        }
    }
    let Some(path) = pb.finish() else {
        return true;
    };

    let sk_stroke = SkStroke {
        width: width as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..SkStroke::default()
    };
    pixmap.stroke_path(&path, paint, &sk_stroke, Transform::identity(), None);
    true
}

/// The raster grown by half a line width plus a pixel, in target pixels.
///
/// Geometry outside it cannot paint the raster.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Window {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const ABOVE: u8 = 4;
const BELOW: u8 = 8;

impl Window {
    fn around(pixmap: &Pixmap, line_width: f64) -> Self {
        let margin = line_width / 2.0 + 1.0;
        Self {
            min_x: -margin,
            min_y: -margin,
            max_x: f64::from(pixmap.width()) + margin,
            max_y: f64::from(pixmap.height()) + margin,
        }
    }

    const fn outcode(self, p: Point) -> u8 {
        let mut code = 0;
        if p.x < self.min_x {
            code |= LEFT;
        } else if p.x > self.max_x {
            code |= RIGHT;
        }
        if p.y < self.min_y {
            code |= ABOVE;
        } else if p.y > self.max_y {
            code |= BELOW;
        }
        code
    }

    const fn contains(self, p: Point) -> bool {
        self.outcode(p) == 0
    }

    /// Cohen-Sutherland clip of the segment `a`-`b`.
    ///
    /// The clipped coordinate is set to the window edge exactly, so an
    /// axis-aligned segment keeps its other coordinate bit for bit.
    fn clip(self, mut a: Point, mut b: Point) -> Option<(Point, Point)> {
        // Each pass moves one endpoint onto an edge; rounding can at
        // worst revisit a corner, so eight passes always settle.
        for _ in 0..8 {
            let (code_a, code_b) = (self.outcode(a), self.outcode(b));
            if code_a | code_b == 0 {
                return Some((a, b));
            }
            if code_a & code_b != 0 {
                return None;
            }
            let out = if code_a == 0 { code_b } else { code_a };
            let edge = self.edge_point(a, b, out);
            if code_a == 0 {
                b = edge;
            } else {
                a = edge;
            }
        }
        None
    }

    /// Where `a`-`b` crosses the edge named by the first bit of `out`.
    fn edge_point(self, a: Point, b: Point, out: u8) -> Point {
        if out & (LEFT | RIGHT) != 0 {
            let x = if out & LEFT == 0 { self.max_x } else { self.min_x };
            let t = (x - a.x) / (b.x - a.x);
            Point::new(x, t.mul_add(b.y - a.y, a.y))
        } else {
            let y = if out & ABOVE == 0 { self.max_y } else { self.min_y };
            let t = (y - a.y) / (b.y - a.y);
            Point::new(t.mul_add(b.x - a.x, a.x), y)
        }
    }
}

/// Collapse an opaque black/white pixmap to a single channel.
fn to_gray(pixmap: &Pixmap) -> GrayImage {
    let data = pixmap.data();
    GrayImage::from_fn(pixmap.width(), pixmap.height(), |x, y| {
        let off = (y as usize * pixmap.width() as usize + x as usize) * 4;
        image::Luma([data[off]])
    })
}

/// Count pixels at full intensity.
pub(crate) fn count_white_pixels(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] == 255)).sum()
}
