//! maskwork-pipeline: Pure mask rasterization and image normalization (sans-IO).
//!
//! Prepares an image and an optional inpainting mask for submission to a
//! remote image-editing API:
//! plan target size -> resample source -> rasterize or conform mask.
//!
//! The mask is always produced at exactly the planned image size, so the
//! pair can be sent together. White pixels mean "edit here", black
//! pixels mean "keep".
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns structured data. Request assembly and
//! transport live in `maskwork-request`.

pub mod capture;
pub mod diagnostics;
pub mod normalize;
pub mod pipeline;
pub mod plan;
pub mod rasterize;
pub mod threshold;
pub mod types;

pub use capture::{ResizePolicy, StrokeCapture};
pub use normalize::{NormalizedImage, ResampleFilter, normalize};
pub use pipeline::{MaskSource, Prepared, Submission};
pub use plan::plan;
pub use rasterize::rasterize;
pub use threshold::{AlphaMode, binarize, conform_mask};
pub use types::{
    CanvasSize, Dimensions, EncodedImage, MaskError, Point, PrepareConfig, Stroke, StrokeSet,
};

/// Prepare a submission in one call.
///
/// Normalizes `source` to its planned size and builds the mask described
/// by `mask_source` at that same size. Equivalent to driving
/// [`Submission`] through every stage.
///
/// # Errors
///
/// Returns [`MaskError::EmptyInput`] if `source` is empty.
/// Returns [`MaskError::ImageDecode`] if the source or a loaded mask
/// cannot be decoded.
/// Returns [`MaskError::InvalidScale`] if stroke coordinates cannot be
/// mapped (an unmeasured canvas).
/// Returns [`MaskError::Encode`] if PNG encoding fails.
pub fn prepare(
    source: &[u8],
    mask_source: &MaskSource,
    config: &PrepareConfig,
) -> Result<Prepared, MaskError> {
    Ok(Submission::new(source.to_vec(), *config)
        .decode()?
        .plan()
        .resample()
        .encode()?
        .mask(mask_source)?
        .into_prepared())
}
