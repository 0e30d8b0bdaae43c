//! Shared types for the maskwork pipeline.

use serde::{Deserialize, Serialize};

use crate::capture::ResizePolicy;
use crate::normalize::ResampleFilter;
use crate::threshold::AlphaMode;

/// Re-export `GrayImage` so downstream crates can reference rendered
/// masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference decoded
/// images without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in the coordinate frame of the canvas that recorded it.
///
/// Points are not self-describing: they only make sense together with
/// the [`CanvasSize`] of the [`StrokeSet`] that carries them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (canvas pixels from the left edge).
    pub x: f64,
    /// Vertical position (canvas pixels from the top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns `true` if both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Scale both coordinates independently.
    #[must_use]
    pub fn scaled(self, scale_x: f64, scale_y: f64) -> Self {
        Self::new(self.x * scale_x, self.y * scale_y)
    }
}

/// One continuous pen-down to pen-up gesture.
///
/// Field names follow the JSON exported by the browser sketch widget
/// (`strokeWidth`, `paths`) so stroke dumps can be read as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Brush diameter in source-canvas pixels.
    #[serde(rename = "strokeWidth")]
    pub stroke_width: f64,
    /// Ordered points of the gesture. May be empty.
    #[serde(default)]
    pub paths: Vec<Point>,
}

impl Stroke {
    /// Create a stroke from a width and its points.
    #[must_use]
    pub const fn new(stroke_width: f64, paths: Vec<Point>) -> Self {
        Self {
            stroke_width,
            paths,
        }
    }

    /// Returns `true` if the stroke has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Returns the points of the stroke.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.paths
    }
}

/// Pixel size of the on-screen drawing surface.
///
/// This is a measured layout box, so fractional values are allowed.
/// It is never assumed to match the native size of the image beneath.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    /// Width in canvas pixels.
    pub width: f64,
    /// Height in canvas pixels.
    pub height: f64,
}

impl CanvasSize {
    /// Create a new canvas size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl From<Dimensions> for CanvasSize {
    fn from(d: Dimensions) -> Self {
        Self::new(f64::from(d.width), f64::from(d.height))
    }
}

/// The strokes drawn on a surface together with the frame they were
/// drawn in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeSet {
    /// Strokes in the order they were drawn.
    pub strokes: Vec<Stroke>,
    /// Frame of reference for every point in `strokes`.
    #[serde(rename = "canvasSize")]
    pub canvas_size: CanvasSize,
}

impl StrokeSet {
    /// Create a stroke set.
    #[must_use]
    pub const fn new(strokes: Vec<Stroke>, canvas_size: CanvasSize) -> Self {
        Self {
            strokes,
            canvas_size,
        }
    }

    /// Returns `true` if nothing was drawn.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Total number of points across all strokes.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(|s| s.paths.len()).sum()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A losslessly encoded PNG and the exact size it encodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    /// PNG file bytes.
    pub png: Vec<u8>,
    /// Pixel dimensions of the encoded raster.
    pub dimensions: Dimensions,
}

/// Configuration for preparing a submission.
///
/// Defaults reproduce the behaviour of the browser client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareConfig {
    /// Filter used when resampling the source to the planned size.
    pub resample_filter: ResampleFilter,
    /// Alpha handling when binarizing a loaded mask image.
    pub mask_alpha: AlphaMode,
    /// How a drawing surface reacts to being resized mid-session.
    pub resize_policy: ResizePolicy,
}

impl PrepareConfig {
    /// Default resampling filter.
    pub const DEFAULT_RESAMPLE_FILTER: ResampleFilter = ResampleFilter::Lanczos3;
    /// Default alpha handling for binarized masks.
    pub const DEFAULT_MASK_ALPHA: AlphaMode = AlphaMode::Opaque;
    /// Default resize policy for drawing surfaces.
    pub const DEFAULT_RESIZE_POLICY: ResizePolicy = ResizePolicy::Rescale;

    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidConfig`] if the JSON is malformed or
    /// names an unknown variant.
    pub fn from_json(json: &str) -> Result<Self, MaskError> {
        serde_json::from_str(json).map_err(|e| MaskError::InvalidConfig(e.to_string()))
    }
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            resample_filter: Self::DEFAULT_RESAMPLE_FILTER,
            mask_alpha: Self::DEFAULT_MASK_ALPHA,
            resize_policy: Self::DEFAULT_RESIZE_POLICY,
        }
    }
}

/// Errors that can occur in the mask pipeline.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum MaskError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Failed to encode the output PNG.
    #[error("failed to encode PNG: {0}")]
    Encode(String),

    /// A canvas or target dimension was zero or non-finite.
    #[error("invalid scale {scale_x}x{scale_y} from canvas {canvas_width}x{canvas_height} to {target}")]
    InvalidScale {
        /// Horizontal scale factor that was computed.
        scale_x: f64,
        /// Vertical scale factor that was computed.
        scale_y: f64,
        /// Source canvas width.
        canvas_width: f64,
        /// Source canvas height.
        canvas_height: f64,
        /// Requested target size.
        target: Dimensions,
    },

    /// The drawing surface refused a resize while strokes exist.
    #[error("drawing surface cannot be resized while it holds {strokes} stroke(s)")]
    SurfaceLocked {
        /// Number of strokes currently recorded.
        strokes: usize,
    },

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `MaskError`.
#[derive(Serialize, Deserialize)]
enum MaskErrorProxy {
    EmptyInput,
    ImageDecode(String),
    Encode(String),
    InvalidScale {
        scale_x: f64,
        scale_y: f64,
        canvas_width: f64,
        canvas_height: f64,
        target: Dimensions,
    },
    SurfaceLocked {
        strokes: usize,
    },
    InvalidConfig(String),
}

impl Serialize for MaskError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::EmptyInput => MaskErrorProxy::EmptyInput,
            Self::ImageDecode(e) => MaskErrorProxy::ImageDecode(e.to_string()),
            Self::Encode(s) => MaskErrorProxy::Encode(s.clone()),
            Self::InvalidScale {
                scale_x,
                scale_y,
                canvas_width,
                canvas_height,
                target,
            } => MaskErrorProxy::InvalidScale {
                scale_x: *scale_x,
                scale_y: *scale_y,
                canvas_width: *canvas_width,
                canvas_height: *canvas_height,
                target: *target,
            },
            Self::SurfaceLocked { strokes } => MaskErrorProxy::SurfaceLocked { strokes: *strokes },
            Self::InvalidConfig(s) => MaskErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MaskError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = MaskErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            MaskErrorProxy::EmptyInput => Self::EmptyInput,
            // The typed `image::ImageError` cannot be rebuilt; keep the message.
            MaskErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            MaskErrorProxy::Encode(s) => Self::Encode(s),
            MaskErrorProxy::InvalidScale {
                scale_x,
                scale_y,
                canvas_width,
                canvas_height,
                target,
            } => Self::InvalidScale {
                scale_x,
                scale_y,
                canvas_width,
                canvas_height,
                target,
            },
            MaskErrorProxy::SurfaceLocked { strokes } => Self::SurfaceLocked { strokes },
            MaskErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}

/// Encode an RGBA raster as PNG.
pub(crate) fn encode_rgba_png(image: &RgbaImage) -> Result<EncodedImage, MaskError> {
    encode_png(
        image.as_raw(),
        Dimensions::new(image.width(), image.height()),
        image::ExtendedColorType::Rgba8,
    )
}

/// Encode a single-channel raster as PNG.
pub(crate) fn encode_gray_png(image: &GrayImage) -> Result<EncodedImage, MaskError> {
    encode_png(
        image.as_raw(),
        Dimensions::new(image.width(), image.height()),
        image::ExtendedColorType::L8,
    )
}

fn encode_png(
    raw: &[u8],
    dimensions: Dimensions,
    color: image::ExtendedColorType,
) -> Result<EncodedImage, MaskError> {
    let mut png = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png);
    image::ImageEncoder::write_image(encoder, raw, dimensions.width, dimensions.height, color)
        .map_err(|e| MaskError::Encode(e.to_string()))?;
    Ok(EncodedImage { png, dimensions })
}

/// Decode raw image bytes, rejecting empty input up front.
pub(crate) fn decode(bytes: &[u8]) -> Result<image::DynamicImage, MaskError> {
    if bytes.is_empty() {
        return Err(MaskError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}
