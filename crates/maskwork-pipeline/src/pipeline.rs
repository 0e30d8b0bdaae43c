//! Incremental submission pipeline: advance stage-by-stage, inspecting
//! each intermediate result before continuing.
//!
//! This is the "on submit" flow: decode the source, plan its API size,
//! resample, encode, then build a mask aligned to the planned size.
//!
//! ```rust
//! # use maskwork_pipeline::{MaskError, MaskSource, PrepareConfig, Submission};
//! # fn run(png: Vec<u8>) -> Result<(), MaskError> {
//! let prepared = Submission::new(png, PrepareConfig::default())
//!     .decode()?
//!     .plan()
//!     .resample()
//!     .encode()?
//!     .mask(&MaskSource::None)?
//!     .into_prepared();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next stage (or a
//! `Result` for fallible stages). Because the mask stage reads its
//! target size from the encoded image, a mask can never be built for a
//! size other than the one the image was normalized to.

use image::DynamicImage;

use crate::normalize::NormalizedImage;
use crate::rasterize::RenderStats;
use crate::types::{Dimensions, EncodedImage, MaskError, PrepareConfig, RgbaImage, StrokeSet};

/// Where the mask for a submission comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskSource {
    /// No mask; the submission edits the whole image (or none).
    None,
    /// Strokes captured live on a drawing surface.
    Strokes(StrokeSet),
    /// A previously saved mask image (any size, any colours).
    Image(Vec<u8>),
}

/// The normalized image and its aligned mask, ready for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    /// Source resampled to the planned API size.
    pub image: NormalizedImage,
    /// Binary mask at exactly the image's dimensions, if one was drawn.
    pub mask: Option<EncodedImage>,
}

impl Prepared {
    /// Planned dimensions shared by the image and the mask.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.image.image.dimensions
    }
}

// ───────────────────────── Stage 0: Submission ──────────────────────────

/// Submission before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Submission {
    config: PrepareConfig,
    source: Vec<u8>,
}

impl Submission {
    /// Start a submission from raw source image bytes.
    pub const fn new(source: Vec<u8>, config: PrepareConfig) -> Self {
        Self { config, source }
    }

    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source image.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::EmptyInput`] if the source is empty and
    /// [`MaskError::ImageDecode`] if it cannot be decoded.
    pub fn decode(self) -> Result<Decoded, MaskError> {
        let source_len = self.source.len();
        let image = crate::types::decode(&self.source)?;
        Ok(Decoded {
            config: self.config,
            image,
            source_len,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Source decoded into pixels.
#[must_use = "pipeline stages are consumed by advancing; call .plan() to continue"]
pub struct Decoded {
    config: PrepareConfig,
    image: DynamicImage,
    source_len: usize,
}

impl Decoded {
    /// Dimensions of the decoded source.
    #[must_use]
    pub fn source_dimensions(&self) -> Dimensions {
        Dimensions::new(self.image.width(), self.image.height())
    }

    /// Size of the encoded source in bytes.
    #[must_use]
    pub const fn source_len(&self) -> usize {
        self.source_len
    }

    /// Compute the target API dimensions.
    pub fn plan(self) -> Planned {
        let source_dimensions = self.source_dimensions();
        let target = crate::plan::plan(source_dimensions);
        Planned {
            config: self.config,
            image: self.image,
            source_dimensions,
            target,
        }
    }
}

// ───────────────────────── Stage 2: Planned ──────────────────────────

/// Target dimensions chosen.
#[must_use = "pipeline stages are consumed by advancing; call .resample() to continue"]
pub struct Planned {
    config: PrepareConfig,
    image: DynamicImage,
    source_dimensions: Dimensions,
    target: Dimensions,
}

impl Planned {
    /// Dimensions of the decoded source.
    #[must_use]
    pub const fn source_dimensions(&self) -> Dimensions {
        self.source_dimensions
    }

    /// Planned target dimensions.
    #[must_use]
    pub const fn target(&self) -> Dimensions {
        self.target
    }

    /// Returns `true` if the source is already at its planned size.
    #[must_use]
    pub fn is_fixed_point(&self) -> bool {
        self.source_dimensions == self.target
    }

    /// Resample the source to the planned dimensions.
    pub fn resample(self) -> Resampled {
        let resampled =
            crate::normalize::resample(&self.image, self.target, self.config.resample_filter);
        Resampled {
            config: self.config,
            resampled,
            source_dimensions: self.source_dimensions,
        }
    }
}

// ───────────────────────── Stage 3: Resampled ──────────────────────────

/// Source resampled to the planned size, not yet encoded.
#[must_use = "pipeline stages are consumed by advancing; call .encode() to continue"]
pub struct Resampled {
    config: PrepareConfig,
    resampled: RgbaImage,
    source_dimensions: Dimensions,
}

impl Resampled {
    /// The resampled raster.
    #[must_use]
    pub const fn resampled(&self) -> &RgbaImage {
        &self.resampled
    }

    /// Encode the resampled raster as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::Encode`] if PNG encoding fails.
    pub fn encode(self) -> Result<Encoded, MaskError> {
        let image = crate::types::encode_rgba_png(&self.resampled)?;
        Ok(Encoded {
            config: self.config,
            image: NormalizedImage {
                image,
                source_dimensions: self.source_dimensions,
            },
        })
    }
}

// ───────────────────────── Stage 4: Encoded ──────────────────────────

/// Normalized image ready; the mask has not been built yet.
#[must_use = "pipeline stages are consumed by advancing; call .mask() to continue"]
pub struct Encoded {
    config: PrepareConfig,
    image: NormalizedImage,
}

impl Encoded {
    /// The normalized image.
    #[must_use]
    pub const fn image(&self) -> &NormalizedImage {
        &self.image
    }

    /// Build the mask at the normalized image's dimensions.
    ///
    /// Strokes that produce no mask (an empty stroke set) leave the
    /// submission unmasked.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidScale`] if the stroke canvas was never
    /// measured, decode errors for an unreadable mask image, and
    /// [`MaskError::Encode`] if PNG encoding fails.
    pub fn mask(self, source: &MaskSource) -> Result<Masked, MaskError> {
        let target = self.image.dimensions();
        let (mask, stats) = match source {
            MaskSource::None => (None, None),
            MaskSource::Strokes(strokes) => {
                match crate::rasterize::render_with_stats(strokes, target)? {
                    Some((raster, stats)) => (
                        Some(crate::types::encode_gray_png(&raster)?),
                        Some(stats),
                    ),
                    None => (None, None),
                }
            }
            MaskSource::Image(bytes) => (
                Some(crate::threshold::conform_mask(
                    bytes,
                    target,
                    self.config.mask_alpha,
                )?),
                None,
            ),
        };
        Ok(Masked {
            image: self.image,
            mask,
            stats,
        })
    }
}

// ───────────────────────── Stage 5: Masked ──────────────────────────

/// Final stage: image and optional mask.
#[must_use = "call .into_prepared() to take the result"]
pub struct Masked {
    image: NormalizedImage,
    mask: Option<EncodedImage>,
    stats: Option<RenderStats>,
}

impl Masked {
    /// The encoded mask, if any.
    #[must_use]
    pub const fn mask(&self) -> Option<&EncodedImage> {
        self.mask.as_ref()
    }

    /// Rendering counts when the mask came from strokes.
    #[must_use]
    pub const fn render_stats(&self) -> Option<RenderStats> {
        self.stats
    }

    /// Consume the pipeline and return the prepared submission.
    #[must_use]
    pub fn into_prepared(self) -> Prepared {
        Prepared {
            image: self.image,
            mask: self.mask,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{CanvasSize, Point, Stroke};

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(w, h, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        crate::types::encode_rgba_png(&img).unwrap().png
    }

    fn diagonal(canvas: CanvasSize) -> StrokeSet {
        StrokeSet::new(
            vec![Stroke::new(
                12.0,
                vec![Point::new(0.0, 0.0), Point::new(canvas.width, canvas.height)],
            )],
            canvas,
        )
    }

    #[test]
    fn stages_expose_intermediates() {
        let decoded = Submission::new(png(200, 150), PrepareConfig::default())
            .decode()
            .unwrap();
        assert_eq!(decoded.source_dimensions(), Dimensions::new(200, 150));
        let planned = decoded.plan();
        assert_eq!(planned.target(), Dimensions::new(1024, 768));
        assert!(!planned.is_fixed_point());
        let resampled = planned.resample();
        assert_eq!(resampled.resampled().dimensions(), (1024, 768));
    }

    #[test]
    fn mask_from_strokes_matches_image_size() {
        let prepared = Submission::new(png(200, 150), PrepareConfig::default())
            .decode()
            .unwrap()
            .plan()
            .resample()
            .encode()
            .unwrap()
            .mask(&MaskSource::Strokes(diagonal(CanvasSize::new(500.0, 375.0))))
            .unwrap()
            .into_prepared();
        let mask = prepared.mask.unwrap();
        assert_eq!(mask.dimensions, prepared.image.dimensions());
        assert_eq!(mask.dimensions, Dimensions::new(1024, 768));
    }

    #[test]
    fn empty_strokes_leave_submission_unmasked() {
        let masked = Submission::new(png(64, 64), PrepareConfig::default())
            .decode()
            .unwrap()
            .plan()
            .resample()
            .encode()
            .unwrap()
            .mask(&MaskSource::Strokes(StrokeSet::new(
                vec![],
                CanvasSize::new(500.0, 500.0),
            )))
            .unwrap();
        assert!(masked.mask().is_none());
        assert!(masked.render_stats().is_none());
    }

    #[test]
    fn loaded_mask_is_conformed_to_image_size() {
        let mask_png = png(37, 21);
        let prepared = Submission::new(png(64, 32), PrepareConfig::default())
            .decode()
            .unwrap()
            .plan()
            .resample()
            .encode()
            .unwrap()
            .mask(&MaskSource::Image(mask_png))
            .unwrap()
            .into_prepared();
        assert_eq!(prepared.dimensions(), Dimensions::new(1024, 512));
        assert_eq!(prepared.mask.unwrap().dimensions, Dimensions::new(1024, 512));
    }

    #[test]
    fn unmeasured_canvas_fails_fast() {
        let result = Submission::new(png(64, 64), PrepareConfig::default())
            .decode()
            .unwrap()
            .plan()
            .resample()
            .encode()
            .unwrap()
            .mask(&MaskSource::Strokes(diagonal(CanvasSize::new(0.0, 0.0))));
        assert!(matches!(result, Err(MaskError::InvalidScale { .. })));
    }

    #[test]
    fn decode_failure_propagates() {
        let result = Submission::new(vec![9, 9, 9], PrepareConfig::default()).decode();
        assert!(matches!(result, Err(MaskError::ImageDecode(_))));
    }
}
