//! Luminance thresholding for masks that arrive as arbitrary images.
//!
//! A mask loaded from disk or exported from a canvas with antialiasing
//! holds intermediate grays (or colours). [`binarize`] maps every pixel
//! to pure black or white using the unweighted channel mean:
//!
//! ```text
//! luminance = (r + g + b) / 3
//! channel   = 255 if luminance > 128 else 0
//! ```
//!
//! Exactly 128 maps to black. The comparison is done on the integer sum
//! (`r + g + b > 384`), which is the same test without rounding.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, EncodedImage, MaskError, RgbaImage};

/// Channel sum above which a pixel becomes white (`3 * 128`).
const WHITE_SUM_THRESHOLD: u16 = 384;

/// What to do with the alpha channel while binarizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlphaMode {
    /// Keep each pixel's alpha unchanged.
    Preserve,
    /// Force every pixel fully opaque.
    #[default]
    Opaque,
}

/// Decode a mask image and binarize it.
///
/// # Errors
///
/// Returns [`MaskError::EmptyInput`] or [`MaskError::ImageDecode`] if
/// the bytes cannot be decoded, and [`MaskError::Encode`] if PNG
/// encoding fails.
pub fn binarize(source: &[u8], alpha: AlphaMode) -> Result<EncodedImage, MaskError> {
    let decoded = crate::types::decode(source)?.to_rgba8();
    crate::types::encode_rgba_png(&binarize_image(&decoded, alpha))
}

/// Binarize an RGBA raster in memory.
#[must_use]
pub fn binarize_image(image: &RgbaImage, alpha: AlphaMode) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let sum = u16::from(r) + u16::from(g) + u16::from(b);
        let v = if sum > WHITE_SUM_THRESHOLD { 255 } else { 0 };
        let a = match alpha {
            AlphaMode::Preserve => a,
            AlphaMode::Opaque => 255,
        };
        pixel.0 = [v, v, v, a];
    }
    out
}

/// Fit a loaded mask image onto a target raster and binarize it.
///
/// The mask is stretched to `target` and thresholded. With
/// [`AlphaMode::Opaque`] it is first composited over black, so
/// transparent regions become "keep"; with [`AlphaMode::Preserve`] the
/// stretched alpha is carried through. This is the path for masks that
/// were not drawn live, e.g. a mask file saved at a different size.
///
/// # Errors
///
/// Returns [`MaskError::EmptyInput`] or [`MaskError::ImageDecode`] if
/// the bytes cannot be decoded, [`MaskError::InvalidScale`] if the
/// target is empty, and [`MaskError::Encode`] if PNG encoding fails.
pub fn conform_mask(
    source: &[u8],
    target: Dimensions,
    alpha: AlphaMode,
) -> Result<EncodedImage, MaskError> {
    if target.width == 0 || target.height == 0 {
        return Err(MaskError::InvalidScale {
            scale_x: 0.0,
            scale_y: 0.0,
            canvas_width: 0.0,
            canvas_height: 0.0,
            target,
        });
    }
    let decoded = crate::types::decode(source)?;
    let stretched = crate::normalize::resample(
        &decoded,
        target,
        crate::normalize::ResampleFilter::Triangle,
    );
    let prepared = match alpha {
        AlphaMode::Opaque => over_black(&stretched),
        AlphaMode::Preserve => stretched,
    };
    crate::types::encode_rgba_png(&binarize_image(&prepared, alpha))
}

/// Composite an RGBA raster over an opaque black background.
#[allow(clippy::cast_possible_truncation)]
fn over_black(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let blend = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
        pixel.0 = [blend(r), blend(g), blend(b), 255];
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uniform(r: u8, g: u8, b: u8, a: u8) -> RgbaImage {
        RgbaImage::from_pixel(4, 4, image::Rgba([r, g, b, a]))
    }

    fn png(image: &RgbaImage) -> Vec<u8> {
        crate::types::encode_rgba_png(image).unwrap().png
    }

    #[test]
    fn exactly_128_maps_to_black() {
        let out = binarize_image(&uniform(128, 128, 128, 255), AlphaMode::Preserve);
        assert!(out.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn just_above_128_maps_to_white() {
        // Sum 385, mean 128.33.
        let out = binarize_image(&uniform(129, 128, 128, 255), AlphaMode::Preserve);
        assert!(out.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn luminance_is_unweighted_mean() {
        // Pure green would be bright under a weighted formula; its mean is 85.
        let green = binarize_image(&uniform(0, 255, 0, 255), AlphaMode::Opaque);
        assert_eq!(green.get_pixel(0, 0).0, [0, 0, 0, 255]);
        // Yellow: mean 170.
        let yellow = binarize_image(&uniform(255, 255, 0, 255), AlphaMode::Opaque);
        assert_eq!(yellow.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn alpha_modes() {
        let src = uniform(200, 200, 200, 40);
        let kept = binarize_image(&src, AlphaMode::Preserve);
        assert_eq!(kept.get_pixel(1, 1).0, [255, 255, 255, 40]);
        let opaque = binarize_image(&src, AlphaMode::Opaque);
        assert_eq!(opaque.get_pixel(1, 1).0, [255, 255, 255, 255]);
    }

    #[test]
    fn binarize_is_idempotent() {
        let src = RgbaImage::from_fn(16, 16, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x * 16 + y) % 256) as u8;
            image::Rgba([v, v / 2, 255 - v, 200])
        });
        let once = binarize_image(&src, AlphaMode::Preserve);
        let twice = binarize_image(&once, AlphaMode::Preserve);
        assert_eq!(once, twice);
    }

    #[test]
    fn binarize_bytes_round_trip() {
        let src = png(&uniform(250, 240, 230, 255));
        let out = binarize(&src, AlphaMode::Opaque).unwrap();
        assert_eq!(out.dimensions, Dimensions::new(4, 4));
        let again = binarize(&out.png, AlphaMode::Opaque).unwrap();
        assert_eq!(out, again);
    }

    #[test]
    fn binarize_rejects_empty_and_corrupt() {
        assert!(matches!(binarize(&[], AlphaMode::Opaque), Err(MaskError::EmptyInput)));
        assert!(matches!(
            binarize(&[1, 2, 3], AlphaMode::Opaque),
            Err(MaskError::ImageDecode(_))
        ));
    }

    #[test]
    fn conform_stretches_and_flattens() {
        // Left half white, right half transparent white.
        let src = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([255, 255, 255, 0])
            }
        });
        let out = conform_mask(&png(&src), Dimensions::new(100, 50), AlphaMode::Opaque).unwrap();
        assert_eq!(out.dimensions, Dimensions::new(100, 50));

        let img = image::load_from_memory(&out.png).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(10, 25).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(90, 25).0, [0, 0, 0, 255]);
        assert!(img
            .pixels()
            .all(|p| (p.0[0] == 0 || p.0[0] == 255) && p.0[3] == 255));
    }

    #[test]
    fn conform_preserve_keeps_transparency() {
        let src = uniform(255, 255, 255, 0);
        let out = conform_mask(&png(&src), Dimensions::new(8, 8), AlphaMode::Preserve).unwrap();
        let img = image::load_from_memory(&out.png).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(3, 3).0, [255, 255, 255, 0]);
    }

    #[test]
    fn conform_rejects_empty_target() {
        let src = png(&uniform(255, 255, 255, 255));
        assert!(matches!(
            conform_mask(&src, Dimensions::new(0, 10), AlphaMode::Opaque),
            Err(MaskError::InvalidScale { .. })
        ));
    }
}
