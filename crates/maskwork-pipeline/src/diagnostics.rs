//! Submission diagnostics: timing, counts, and other metrics for each stage.
//!
//! [`prepare_with_diagnostics`] runs the same stages as
//! [`prepare`](crate::prepare) and records how long each took plus a few
//! stage-specific numbers (pixel counts, scale factors, bytes written).
//!
//! This crate does no clock access of its own. Callers pass a [`Clock`]
//! so the same code runs natively and in a browser worker.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{MaskSource, Prepared, Submission};
use crate::types::{MaskError, PrepareConfig};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single submission.
///
/// `mask` is `None` when the submission carried no mask source or the
/// strokes were empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionDiagnostics {
    /// Stage 0: source decoding.
    pub decode: StageDiagnostics,
    /// Stage 1: size planning.
    pub plan: StageDiagnostics,
    /// Stage 2: resampling to the planned size.
    pub resample: StageDiagnostics,
    /// Stage 3: PNG encoding of the normalized image.
    pub encode: StageDiagnostics,
    /// Stage 4: mask rasterization or conforming.
    pub mask: Option<StageDiagnostics>,
    /// Total wall-clock duration of the submission (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: SubmissionSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Source decoding.
    Decode {
        /// Size of the input bytes.
        input_bytes: usize,
        /// Decoded width in pixels.
        width: u32,
        /// Decoded height in pixels.
        height: u32,
    },
    /// Size planning.
    Plan {
        /// Planned width.
        width: u32,
        /// Planned height.
        height: u32,
        /// Whether the source already had its planned size.
        fixed_point: bool,
    },
    /// Resampling.
    Resample {
        /// Filter used.
        filter: String,
        /// Pixels in the resampled raster.
        pixel_count: u64,
    },
    /// PNG encoding.
    Encode {
        /// Size of the encoded PNG.
        output_bytes: usize,
    },
    /// Mask built from strokes.
    MaskStrokes {
        /// Strokes in the stroke set.
        stroke_count: usize,
        /// Points across all strokes.
        point_count: usize,
        /// Strokes actually drawn.
        drawn: usize,
        /// Strokes skipped (empty or non-finite).
        skipped: usize,
        /// Horizontal scale from canvas to target.
        scale_x: f64,
        /// Vertical scale from canvas to target.
        scale_y: f64,
        /// White (edit) pixels in the mask.
        white_pixels: u64,
        /// Total pixels in the mask.
        total_pixels: u64,
        /// Size of the encoded mask PNG.
        output_bytes: usize,
    },
    /// Mask conformed from a loaded image.
    MaskImage {
        /// Size of the loaded mask bytes.
        input_bytes: usize,
        /// Size of the encoded mask PNG.
        output_bytes: usize,
    },
}

/// High-level summary for a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionSummary {
    /// Source width in pixels.
    pub source_width: u32,
    /// Source height in pixels.
    pub source_height: u32,
    /// Planned width in pixels.
    pub target_width: u32,
    /// Planned height in pixels.
    pub target_height: u32,
    /// Whether a mask was produced.
    pub masked: bool,
}

/// Run a submission with per-stage timing and metrics.
///
/// # Errors
///
/// Propagates any [`MaskError`] from the stages, as
/// [`prepare`](crate::prepare) does.
pub fn prepare_with_diagnostics<C: Clock>(
    source: &[u8],
    mask_source: &MaskSource,
    config: &PrepareConfig,
    clock: &C,
) -> Result<(Prepared, SubmissionDiagnostics), MaskError> {
    let total_start = clock.now();

    let t = clock.now();
    let decoded = Submission::new(source.to_vec(), *config).decode()?;
    let source_dimensions = decoded.source_dimensions();
    let decode = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Decode {
            input_bytes: decoded.source_len(),
            width: source_dimensions.width,
            height: source_dimensions.height,
        },
    };

    let t = clock.now();
    let planned = decoded.plan();
    let target = planned.target();
    let plan = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Plan {
            width: target.width,
            height: target.height,
            fixed_point: planned.is_fixed_point(),
        },
    };

    let t = clock.now();
    let resampled = planned.resample();
    let resample = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Resample {
            filter: config.resample_filter.to_string(),
            pixel_count: target.pixel_count(),
        },
    };

    let t = clock.now();
    let encoded = resampled.encode()?;
    let encode = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Encode {
            output_bytes: encoded.image().image.png.len(),
        },
    };

    let t = clock.now();
    let masked = encoded.mask(mask_source)?;
    let mask_duration = clock.elapsed(&t);
    let mask = masked.mask().map(|m| {
        let metrics = match (mask_source, masked.render_stats()) {
            (MaskSource::Strokes(strokes), Some(stats)) => {
                let scale = crate::rasterize::Scale::between(strokes, target).ok();
                StageMetrics::MaskStrokes {
                    stroke_count: strokes.strokes.len(),
                    point_count: strokes.point_count(),
                    drawn: stats.drawn,
                    skipped: stats.skipped,
                    scale_x: scale.map_or(0.0, |s| s.x),
                    scale_y: scale.map_or(0.0, |s| s.y),
                    white_pixels: stats.white_pixels,
                    total_pixels: target.pixel_count(),
                    output_bytes: m.png.len(),
                }
            }
            (MaskSource::Image(bytes), _) => StageMetrics::MaskImage {
                input_bytes: bytes.len(),
                output_bytes: m.png.len(),
            },
            _ => StageMetrics::MaskImage {
                input_bytes: 0,
                output_bytes: m.png.len(),
            },
        };
        StageDiagnostics {
            duration: mask_duration,
            metrics,
        }
    });

    let prepared = masked.into_prepared();
    let summary = SubmissionSummary {
        source_width: source_dimensions.width,
        source_height: source_dimensions.height,
        target_width: target.width,
        target_height: target.height,
        masked: prepared.mask.is_some(),
    };

    let diagnostics = SubmissionDiagnostics {
        decode,
        plan,
        resample,
        encode,
        mask,
        total_duration: clock.elapsed(&total_start),
        summary,
    };
    Ok((prepared, diagnostics))
}

impl SubmissionDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Submission Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Source: {}x{} -> API: {}x{}{}",
            self.summary.source_width,
            self.summary.source_height,
            self.summary.target_width,
            self.summary.target_height,
            if self.summary.masked { " (masked)" } else { "" },
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<12} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let mut stages = vec![
            ("Decode", &self.decode),
            ("Plan", &self.plan),
            ("Resample", &self.resample),
            ("Encode", &self.encode),
        ];
        if let Some(ref m) = self.mask {
            stages.push(("Mask", m));
        }

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<12} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Plan {
            width,
            height,
            fixed_point,
        } => {
            if *fixed_point {
                format!("{width}x{height} (unchanged)")
            } else {
                format!("{width}x{height}")
            }
        }
        StageMetrics::Resample {
            filter,
            pixel_count,
        } => format!("{filter} {pixel_count} px"),
        StageMetrics::Encode { output_bytes } => format!("{output_bytes} bytes"),
        StageMetrics::MaskStrokes {
            stroke_count,
            point_count,
            drawn,
            skipped,
            scale_x,
            scale_y,
            white_pixels,
            total_pixels,
            output_bytes,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let coverage = if *total_pixels > 0 {
                *white_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "{stroke_count} strokes ({drawn} drawn, {skipped} skipped), {point_count} pts, scale={scale_x:.3}x{scale_y:.3}, white={coverage:.1}%, {output_bytes} bytes",
            )
        }
        StageMetrics::MaskImage {
            input_bytes,
            output_bytes,
        } => format!("loaded {input_bytes} bytes -> {output_bytes} bytes"),
    }
}
