//! Output size planning for the generation API.
//!
//! The generation API only accepts heights from a fixed lattice
//! ([`ALLOWED_SIZES`]) and widths up to [`MAX_WIDTH`] that are a
//! multiple of 8. [`plan`] picks the target size for an arbitrary
//! source image, preserving aspect ratio:
//!
//! ```text
//! aspect = w / h
//! for h' in ALLOWED_SIZES (descending):
//!     w' = round(h' * aspect / 8) * 8        reject if w' > 1024
//!     scale = h' / h
//! upscale regime (w * h < 1024²): pick the largest scale
//! otherwise:                       pick the smallest scale >= 1
//! no candidate:                    { 1024, max(1, round(1024 / aspect)) }
//! ```
//!
//! Widths that round to zero are raised to 8. Only the width is
//! guaranteed to be a multiple of 8. The fallback height is not snapped
//! and, for portrait sources in the downscale regime, can exceed 1024.

use crate::types::Dimensions;

/// Heights accepted by the generation API, largest first.
pub const ALLOWED_SIZES: [u32; 16] = [
    1024, 960, 896, 832, 768, 704, 640, 576, 512, 448, 384, 320, 256, 192, 128, 64,
];

/// Largest width the generation API accepts.
pub const MAX_WIDTH: u32 = 1024;

/// Width granularity required by the generation API.
pub const WIDTH_STEP: u32 = 8;

/// Sources with fewer pixels than this are upscaled.
const UPSCALE_PIXEL_THRESHOLD: u64 = 1024 * 1024;

/// One lattice entry that fits the width limit.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    dimensions: Dimensions,
    scale: f64,
}

/// Compute the target size for a source image of the given size.
///
/// Pure and deterministic. Both source dimensions must be non-zero;
/// a zero height yields a non-finite aspect ratio, which lands in the
/// fallback branch rather than panicking.
#[must_use]
pub fn plan(original: Dimensions) -> Dimensions {
    let aspect = f64::from(original.width) / f64::from(original.height);
    let upscale = original.pixel_count() < UPSCALE_PIXEL_THRESHOLD;

    let candidates = ALLOWED_SIZES.iter().filter_map(|&height| {
        let width = snap_width(f64::from(height) * aspect)?;
        Some(Candidate {
            dimensions: Dimensions::new(width, height),
            scale: f64::from(height) / f64::from(original.height),
        })
    });

    let chosen = if upscale {
        // Ties keep the earlier, taller candidate.
        candidates.fold(None, |best: Option<Candidate>, c| match best {
            Some(b) if b.scale >= c.scale => Some(b),
            _ => Some(c),
        })
    } else {
        candidates
            .filter(|c| c.scale >= 1.0)
            .fold(None, |best: Option<Candidate>, c| match best {
                Some(b) if b.scale <= c.scale => Some(b),
                _ => Some(c),
            })
    };

    chosen.map_or_else(|| fallback(aspect), |c| c.dimensions)
}

/// Returns `true` if `plan` leaves these dimensions unchanged.
#[must_use]
pub fn is_fixed_point(dimensions: Dimensions) -> bool {
    plan(dimensions) == dimensions
}

/// Round a raw width to the 8-pixel grid, rejecting widths over the limit.
///
/// Widths that would round to zero are raised to one step, so a very
/// narrow source still plans to a positive width.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn snap_width(raw: f64) -> Option<u32> {
    let step = f64::from(WIDTH_STEP);
    let snapped = ((raw / step).round() * step).max(step);
    if !snapped.is_finite() || snapped > f64::from(MAX_WIDTH) {
        return None;
    }
    Some(snapped as u32)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn fallback(aspect: f64) -> Dimensions {
    let mut height = (f64::from(MAX_WIDTH) / aspect).round();
    if aspect.is_finite() {
        // Extreme panoramas round to zero rows otherwise.
        height = height.max(1.0);
    }
    // `as` saturates: NaN -> 0, +inf -> u32::MAX.
    Dimensions::new(MAX_WIDTH, height as u32)
}
