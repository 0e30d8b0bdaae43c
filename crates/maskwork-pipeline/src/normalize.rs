//! Resample a source image to its planned API size.
//!
//! Decodes the source, asks [`plan`](crate::plan::plan) for the target
//! size, resamples to exactly that size, and re-encodes as PNG. Sources
//! already at a fixed-point size are re-encoded without resampling.

use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, EncodedImage, MaskError, RgbaImage};

/// Resampling filter used when normalizing.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResampleFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: close to a browser canvas `drawImage`.
    Triangle,
    /// Bicubic (Catmull-Rom): good quality.
    CatmullRom,
    /// Gaussian: smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: sharpest, best for photos.
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// A source image resampled to its planned size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    /// The PNG-encoded raster at the planned size.
    pub image: EncodedImage,
    /// Size of the decoded source before resampling.
    pub source_dimensions: Dimensions,
}

impl NormalizedImage {
    /// The planned (output) dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.image.dimensions
    }
}

/// Decode `source`, resample it to the planned size, and encode as PNG.
///
/// # Errors
///
/// Returns [`MaskError::EmptyInput`] if `source` is empty.
/// Returns [`MaskError::ImageDecode`] if the bytes are not a decodable image.
/// Returns [`MaskError::Encode`] if PNG encoding fails.
pub fn normalize(source: &[u8], filter: ResampleFilter) -> Result<NormalizedImage, MaskError> {
    let decoded = crate::types::decode(source)?;
    let source_dimensions = Dimensions::new(decoded.width(), decoded.height());
    let target = crate::plan::plan(source_dimensions);
    let resampled = resample(&decoded, target, filter);
    let image = crate::types::encode_rgba_png(&resampled)?;
    Ok(NormalizedImage {
        image,
        source_dimensions,
    })
}

/// Resample a decoded image to exactly `target`, ignoring aspect ratio.
///
/// Returns an RGBA copy without filtering when the size already matches.
#[must_use]
pub fn resample(image: &DynamicImage, target: Dimensions, filter: ResampleFilter) -> RgbaImage {
    if image.width() == target.width && image.height() == target.height {
        return image.to_rgba8();
    }
    image
        .resize_exact(target.width, target.height, filter.to_image_filter())
        .to_rgba8()
}
