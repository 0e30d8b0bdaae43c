//! Freehand stroke capture on a measured drawing surface.
//!
//! [`StrokeCapture`] records strokes in the coordinate frame of the
//! surface itself, which is the on-screen box of the displayed image and
//! generally not its native pixel size. [`StrokeCapture::export_stroke_set`]
//! pairs the strokes with that frame so the rasterizer can map them onto
//! any target size.
//!
//! Recording, clearing, and resizing take `&mut self`, so a surface has
//! exactly one active drawing session at a time.

use serde::{Deserialize, Serialize};

use crate::types::{CanvasSize, MaskError, Point, PrepareConfig, Stroke, StrokeSet};

/// Brush diameter on a 600px-wide surface.
pub const REFERENCE_BRUSH_WIDTH: f64 = 40.0;

/// Surface width at which the brush is [`REFERENCE_BRUSH_WIDTH`] wide.
pub const REFERENCE_SURFACE_WIDTH: f64 = 600.0;

/// What a surface does with recorded strokes when its size changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizePolicy {
    /// Rescale recorded points per axis (and widths by the x factor)
    /// into the new frame.
    #[default]
    Rescale,
    /// Refuse to resize while any stroke is recorded.
    Lock,
    /// Update the size but leave recorded coordinates untouched.
    ///
    /// Exports after a resize then mix frames, which distorts the mask.
    /// Matches the legacy sketch widget.
    Ignore,
}

/// A drawing surface that records freehand strokes.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeCapture {
    size: CanvasSize,
    policy: ResizePolicy,
    strokes: Vec<Stroke>,
    active: Option<Stroke>,
}

impl StrokeCapture {
    /// Create an empty surface of the given measured size.
    #[must_use]
    pub fn new(size: CanvasSize) -> Self {
        Self::with_policy(size, ResizePolicy::default())
    }

    /// Create an empty surface with an explicit resize policy.
    #[must_use]
    pub const fn with_policy(size: CanvasSize, policy: ResizePolicy) -> Self {
        Self {
            size,
            policy,
            strokes: Vec::new(),
            active: None,
        }
    }

    /// Create an empty surface with the configured resize policy.
    #[must_use]
    pub const fn from_config(size: CanvasSize, config: &PrepareConfig) -> Self {
        Self::with_policy(size, config.resize_policy)
    }

    /// Restore a surface from an exported stroke set, with the configured
    /// resize policy.
    #[must_use]
    pub fn from_stroke_set(set: StrokeSet, config: &PrepareConfig) -> Self {
        Self {
            size: set.canvas_size,
            policy: config.resize_policy,
            strokes: set.strokes,
            active: None,
        }
    }

    /// Current surface size.
    #[must_use]
    pub const fn size(&self) -> CanvasSize {
        self.size
    }

    /// Resize policy in effect.
    #[must_use]
    pub const fn policy(&self) -> ResizePolicy {
        self.policy
    }

    /// Number of strokes recorded, including one still being drawn.
    #[must_use]
    pub fn stroke_count(&self) -> usize {
        self.strokes.len() + usize::from(self.active.is_some())
    }

    /// Returns `true` if nothing has been drawn.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stroke_count() == 0
    }

    /// Brush width the sketch widget uses for this surface width.
    #[must_use]
    pub fn default_stroke_width(&self) -> f64 {
        REFERENCE_BRUSH_WIDTH * (self.size.width / REFERENCE_SURFACE_WIDTH)
    }

    /// Append a complete stroke.
    ///
    /// Any stroke still being drawn is finished first so recording order
    /// is preserved.
    pub fn record_stroke(&mut self, width: f64, points: Vec<Point>) {
        self.end_stroke();
        self.strokes.push(Stroke::new(width, points));
    }

    /// Start a new stroke at `point` (pen down).
    pub fn begin_stroke(&mut self, width: f64, point: Point) {
        self.end_stroke();
        self.active = Some(Stroke::new(width, vec![point]));
    }

    /// Extend the active stroke (pen drag). No-op without an active stroke.
    pub fn extend_stroke(&mut self, point: Point) {
        if let Some(active) = self.active.as_mut() {
            active.paths.push(point);
        }
    }

    /// Finish the active stroke (pen up). No-op without an active stroke.
    pub fn end_stroke(&mut self) {
        if let Some(active) = self.active.take() {
            self.strokes.push(active);
        }
    }

    /// Discard every stroke, including one still being drawn.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.active = None;
    }

    /// Change the surface size (e.g. after a window resize).
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::SurfaceLocked`] under [`ResizePolicy::Lock`]
    /// when strokes exist and the size actually changes.
    pub fn resize(&mut self, new_size: CanvasSize) -> Result<(), MaskError> {
        if new_size == self.size {
            return Ok(());
        }
        match self.policy {
            ResizePolicy::Lock if !self.is_empty() => {
                return Err(MaskError::SurfaceLocked {
                    strokes: self.stroke_count(),
                });
            }
            ResizePolicy::Rescale => {
                let scale_x = new_size.width / self.size.width;
                let scale_y = new_size.height / self.size.height;
                if scale_x.is_finite() && scale_y.is_finite() {
                    for stroke in self.strokes.iter_mut().chain(self.active.as_mut()) {
                        rescale_stroke(stroke, scale_x, scale_y);
                    }
                }
            }
            ResizePolicy::Lock | ResizePolicy::Ignore => {}
        }
        self.size = new_size;
        Ok(())
    }

    /// Snapshot the strokes together with the current surface size.
    ///
    /// An in-progress stroke is included. Returns an empty stroke list
    /// when nothing was drawn.
    #[must_use]
    pub fn export_stroke_set(&self) -> StrokeSet {
        let strokes = self
            .strokes
            .iter()
            .chain(self.active.as_ref())
            .cloned()
            .collect();
        StrokeSet::new(strokes, self.size)
    }
}

/// Same x-only width scaling the rasterizer applies.
fn rescale_stroke(stroke: &mut Stroke, scale_x: f64, scale_y: f64) {
    stroke.stroke_width *= scale_x;
    for p in &mut stroke.paths {
        *p = p.scaled(scale_x, scale_y);
    }
}
