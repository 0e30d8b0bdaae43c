//! maskwork: CLI for preparing images and masks for inpainting requests.
//!
//! Runs the pipeline on files so results can be inspected outside the
//! browser client:
//!
//! - `plan`: print the API size chosen for a source size
//! - `normalize`: resample an image to its planned size
//! - `rasterize`: render exported stroke JSON into a mask
//! - `binarize`: threshold an arbitrary mask image to pure black/white
//! - `prepare`: run a whole submission with per-stage diagnostics and
//!   optionally write the request payload
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin maskwork -- prepare photo.jpg --strokes strokes.json --prompt "a sofa"
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use maskwork_pipeline::diagnostics::{Clock, SubmissionDiagnostics};
use maskwork_pipeline::{
    AlphaMode, CanvasSize, Dimensions, MaskSource, PrepareConfig, ResampleFilter, ResizePolicy,
    StrokeCapture, StrokeSet,
};
use maskwork_request::{RequestPayload, Task};

/// Prepare images and masks for prompt-driven image editing.
#[derive(Parser)]
#[command(name = "maskwork", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output machine-readable JSON instead of a human-readable report.
    #[arg(long, global = true)]
    json: bool,

    /// Full prepare config as a JSON string.
    ///
    /// When provided, `--filter`, `--mask-alpha`, and `--resize-policy`
    /// are ignored. The JSON
    /// must be a valid `PrepareConfig` serialization.
    #[arg(long, global = true)]
    config_json: Option<String>,

    /// Resampling filter for normalization.
    #[arg(long, global = true, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    filter: Filter,

    /// Alpha handling when binarizing a mask image.
    #[arg(long, global = true, value_enum, default_value_t = CLI_DEFAULT_ALPHA)]
    mask_alpha: Alpha,

    /// What the drawing surface does with strokes when it is resized.
    #[arg(long, global = true, value_enum, default_value_t = CLI_DEFAULT_RESIZE)]
    resize_policy: Resize,
}

#[derive(Subcommand)]
enum Command {
    /// Print the planned API dimensions for a source size.
    Plan {
        /// Source width in pixels.
        width: u32,
        /// Source height in pixels.
        height: u32,
    },
    /// Resample an image to its planned size and write it as PNG.
    Normalize {
        /// Input image (PNG, JPEG, BMP, WebP).
        image_path: PathBuf,
        /// Output PNG path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Render exported stroke JSON into a binary mask PNG.
    Rasterize {
        /// Stroke set JSON (`{"strokes": [...], "canvasSize": {...}}`).
        strokes_path: PathBuf,
        /// Target width in pixels.
        #[arg(long)]
        width: u32,
        /// Target height in pixels.
        #[arg(long)]
        height: u32,
        /// Resize the drawing surface to this width before exporting.
        #[arg(long, requires = "canvas_height")]
        canvas_width: Option<f64>,
        /// Resize the drawing surface to this height before exporting.
        #[arg(long, requires = "canvas_width")]
        canvas_height: Option<f64>,
        /// Output PNG path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Threshold a mask image to pure black and white.
    Binarize {
        /// Input mask image.
        mask_path: PathBuf,
        /// Output PNG path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Run a full submission and print per-stage diagnostics.
    Prepare(PrepareArgs),
}

#[derive(Args)]
struct PrepareArgs {
    /// Input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Stroke set JSON to rasterize as the mask.
    #[arg(long, conflicts_with = "mask_image")]
    strokes: Option<PathBuf>,

    /// Previously saved mask image to conform to the planned size.
    #[arg(long)]
    mask_image: Option<PathBuf>,

    /// Write the normalized image to this PNG path.
    #[arg(long)]
    image_out: Option<PathBuf>,

    /// Write the mask to this PNG path.
    #[arg(long)]
    mask_out: Option<PathBuf>,

    /// Prompt for the request payload.
    #[arg(long)]
    prompt: Option<String>,

    /// Task used for route selection when the payload has no image.
    #[arg(long, value_enum, default_value_t = TaskArg::Inpaint)]
    task: TaskArg,

    /// Write the request payload JSON to this path (requires `--prompt`).
    #[arg(long, requires = "prompt")]
    payload_out: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    runs: usize,
}

/// Resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Alpha handling selection.
#[derive(Clone, Copy, ValueEnum)]
enum Alpha {
    /// Keep each pixel's alpha.
    Preserve,
    /// Force every pixel opaque.
    Opaque,
}

/// Surface resize policy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Resize {
    /// Move recorded strokes into the new frame.
    Rescale,
    /// Refuse to resize once something is drawn.
    Lock,
    /// Keep recorded coordinates as they are.
    Ignore,
}

/// Task selection.
#[derive(Clone, Copy, ValueEnum)]
enum TaskArg {
    /// Text-to-image.
    Generate,
    /// Masked edit.
    Inpaint,
    /// Whole-image staging edit.
    StageHome,
    /// Background removal (routed as generate).
    RemoveBackground,
}

impl From<TaskArg> for Task {
    fn from(task: TaskArg) -> Self {
        match task {
            TaskArg::Generate => Self::Generate,
            TaskArg::Inpaint => Self::Inpaint,
            TaskArg::StageHome => Self::StageHome,
            TaskArg::RemoveBackground => Self::RemoveBackground,
        }
    }
}

const fn filter_from_pipeline(f: ResampleFilter) -> Filter {
    match f {
        ResampleFilter::Nearest => Filter::Nearest,
        ResampleFilter::Triangle => Filter::Triangle,
        ResampleFilter::CatmullRom => Filter::CatmullRom,
        ResampleFilter::Gaussian => Filter::Gaussian,
        ResampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

const fn alpha_from_pipeline(a: AlphaMode) -> Alpha {
    match a {
        AlphaMode::Preserve => Alpha::Preserve,
        AlphaMode::Opaque => Alpha::Opaque,
    }
}

const fn resize_from_pipeline(r: ResizePolicy) -> Resize {
    match r {
        ResizePolicy::Rescale => Resize::Rescale,
        ResizePolicy::Lock => Resize::Lock,
        ResizePolicy::Ignore => Resize::Ignore,
    }
}

/// CLI defaults derived from [`PrepareConfig`] so the two cannot drift.
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(PrepareConfig::DEFAULT_RESAMPLE_FILTER);
const CLI_DEFAULT_ALPHA: Alpha = alpha_from_pipeline(PrepareConfig::DEFAULT_MASK_ALPHA);
const CLI_DEFAULT_RESIZE: Resize = resize_from_pipeline(PrepareConfig::DEFAULT_RESIZE_POLICY);

/// Build a [`PrepareConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<PrepareConfig, String> {
    if let Some(ref json) = cli.config_json {
        return PrepareConfig::from_json(json).map_err(|e| format!("--config-json: {e}"));
    }

    Ok(PrepareConfig {
        resample_filter: match cli.filter {
            Filter::Nearest => ResampleFilter::Nearest,
            Filter::Triangle => ResampleFilter::Triangle,
            Filter::CatmullRom => ResampleFilter::CatmullRom,
            Filter::Gaussian => ResampleFilter::Gaussian,
            Filter::Lanczos3 => ResampleFilter::Lanczos3,
        },
        mask_alpha: match cli.mask_alpha {
            Alpha::Preserve => AlphaMode::Preserve,
            Alpha::Opaque => AlphaMode::Opaque,
        },
        resize_policy: match cli.resize_policy {
            Resize::Rescale => ResizePolicy::Rescale,
            Resize::Lock => ResizePolicy::Lock,
            Resize::Ignore => ResizePolicy::Ignore,
        },
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Command::Plan { width, height } => run_plan(Dimensions::new(*width, *height), cli.json),
        Command::Normalize { image_path, output } => run_normalize(image_path, output, &config),
        Command::Rasterize {
            strokes_path,
            width,
            height,
            canvas_width,
            canvas_height,
            output,
        } => {
            let resize = canvas_width
                .zip(*canvas_height)
                .map(|(w, h)| CanvasSize::new(w, h));
            run_rasterize(
                strokes_path,
                Dimensions::new(*width, *height),
                resize,
                output,
                &config,
            )
        }
        Command::Binarize { mask_path, output } => run_binarize(mask_path, output, &config),
        Command::Prepare(args) => run_prepare(args, &config, cli.json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run_plan(source: Dimensions, json: bool) -> Result<(), String> {
    let target = maskwork_pipeline::plan(source);
    if json {
        let value = serde_json::json!({ "source": source, "target": target });
        println!("{value}");
    } else {
        println!("{source} -> {target}");
    }
    Ok(())
}

fn run_normalize(image_path: &Path, output: &Path, config: &PrepareConfig) -> Result<(), String> {
    let bytes = read(image_path)?;
    let normalized = maskwork_pipeline::normalize(&bytes, config.resample_filter)
        .map_err(|e| format!("Pipeline error: {e}"))?;
    write(output, &normalized.image.png)?;
    println!("{} -> {}", normalized.source_dimensions, normalized.dimensions());
    Ok(())
}

fn run_rasterize(
    strokes_path: &Path,
    target: Dimensions,
    resize: Option<CanvasSize>,
    output: &Path,
    config: &PrepareConfig,
) -> Result<(), String> {
    let mut surface = StrokeCapture::from_stroke_set(read_strokes(strokes_path)?, config);
    if let Some(size) = resize {
        surface.resize(size).map_err(|e| format!("Pipeline error: {e}"))?;
    }
    let strokes = surface.export_stroke_set();
    eprintln!(
        "Strokes: {} ({} points) on {}x{} canvas",
        strokes.strokes.len(),
        strokes.point_count(),
        strokes.canvas_size.width,
        strokes.canvas_size.height,
    );
    match maskwork_pipeline::rasterize(&strokes, target) {
        Ok(Some(mask)) => {
            write(output, &mask.png)?;
            println!("{target} mask written to {}", output.display());
            Ok(())
        }
        Ok(None) => {
            println!("No strokes; no mask written");
            Ok(())
        }
        Err(e) => Err(format!("Pipeline error: {e}")),
    }
}

fn run_binarize(mask_path: &Path, output: &Path, config: &PrepareConfig) -> Result<(), String> {
    let bytes = read(mask_path)?;
    let mask = maskwork_pipeline::binarize(&bytes, config.mask_alpha)
        .map_err(|e| format!("Pipeline error: {e}"))?;
    write(output, &mask.png)?;
    println!("{} mask written to {}", mask.dimensions, output.display());
    Ok(())
}

fn run_prepare(args: &PrepareArgs, config: &PrepareConfig, json: bool) -> Result<(), String> {
    let image_bytes = read(&args.image_path)?;
    let mask_source = match (&args.strokes, &args.mask_image) {
        (Some(path), _) => MaskSource::Strokes(read_strokes(path)?),
        (None, Some(path)) => MaskSource::Image(read(path)?),
        (None, None) => MaskSource::None,
    };

    eprintln!(
        "Image: {} ({} bytes)",
        args.image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", args.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(args.runs);
    let mut first = None;

    for run in 0..args.runs {
        if args.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, args.runs);
        }

        let (prepared, diagnostics) = maskwork_pipeline::diagnostics::prepare_with_diagnostics(
            &image_bytes,
            &mask_source,
            config,
            &StdClock,
        )
        .map_err(|e| format!("Pipeline error: {e}"))?;

        if json {
            let out = serde_json::to_string_pretty(&diagnostics)
                .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
            println!("{out}");
        } else {
            println!("{}", diagnostics.report());
        }

        if first.is_none() {
            first = Some(prepared);
        }
        all_diagnostics.push(diagnostics);

        if args.runs > 1 {
            eprintln!();
        }
    }

    if args.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    let Some(prepared) = first else {
        return Ok(());
    };

    if let Some(ref path) = args.image_out {
        write(path, &prepared.image.image.png)?;
        eprintln!("Image written to {}", path.display());
    }
    if let Some(ref path) = args.mask_out {
        match &prepared.mask {
            Some(mask) => {
                write(path, &mask.png)?;
                eprintln!("Mask written to {}", path.display());
            }
            None => eprintln!("No mask produced; {} not written", path.display()),
        }
    }

    if let (Some(path), Some(prompt)) = (&args.payload_out, &args.prompt) {
        let payload = RequestPayload::from_prepared(prompt.as_str(), &prepared)
            .map_err(|e| format!("Request error: {e}"))?;
        let route = maskwork_request::select_route(args.task.into(), &payload)
            .map_err(|e| format!("Request error: {e}"))?;
        let body = payload
            .to_json()
            .map_err(|e| format!("Request error: {e}"))?;
        write(path, body.as_bytes())?;
        eprintln!(
            "Payload for {route} written to {} ({} bytes)",
            path.display(),
            body.len(),
        );
    }

    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

fn write(path: &Path, bytes: &[u8]) -> Result<(), String> {
    std::fs::write(path, bytes).map_err(|e| format!("Error writing {}: {e}", path.display()))
}

fn read_strokes(path: &Path) -> Result<StrokeSet, String> {
    let bytes = read(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| format!("Error parsing strokes {}: {e}", path.display()))
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&SubmissionDiagnostics) -> Option<Duration>;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[SubmissionDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<12} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(28));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Decode", |d| Some(d.decode.duration)),
        ("Plan", |d| Some(d.plan.duration)),
        ("Resample", |d| Some(d.resample.duration)),
        ("Encode", |d| Some(d.encode.duration)),
        ("Mask", |d| d.mask.as_ref().map(|s| s.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<12} {stage_mean:>10.3}ms");
    }
}
