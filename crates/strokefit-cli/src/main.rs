//! strokefit: CLI for shape regularization of 2D line art.
//!
//! Reads a drawing from a CSV or SVG file, fits a line and a circle to
//! every polyline, detects symmetry, completes occluded gaps, and prints a
//! report. Useful for:
//!
//! - Checking which strokes read as straight lines vs. circular arcs
//! - Finding reflective axes and rotational orders of closed shapes
//! - Previewing gap completion in `connected` vs. `disconnected` mode
//! - Tuning tolerances against real drawings
//!
//! Set `RUST_LOG=strokefit_pipeline=debug` for per-polyline tracing.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin strokefit -- [OPTIONS] <INPUT>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use strokefit_pipeline::{AnalysisConfig, AnalyzedPolyline, Drawing, OcclusionKind};
use tracing_subscriber::EnvFilter;

/// Shape regularization, symmetry detection and curve completion for
/// 2D line art.
///
/// Analyzes every polyline of a CSV (`path,polyline,x,y` rows) or SVG
/// drawing and prints a summary of fits, symmetries and completions.
#[derive(Parser)]
#[command(name = "strokefit", version)]
struct Cli {
    /// Path to the input drawing (`.csv` or `.svg`).
    input: PathBuf,

    /// How an occluded gap is filled.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_OCCLUSION)]
    occlusion: Occlusion,

    /// Circle score must be below the line score times this to win.
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_CIRCLE_PREFERENCE)]
    circle_preference: f64,

    /// Points each stroke is resampled to for symmetry comparison.
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_RESAMPLE_COUNT, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(8..))]
    resample_count: usize,

    /// Candidate reflection axes over half a turn.
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_AXIS_STEPS, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    axis_steps: usize,

    /// Highest rotational order tested.
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_MAX_ROTATION_ORDER, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(2..))]
    max_rotation_order: usize,

    /// Largest normalized mismatch accepted as symmetric.
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_SYMMETRY_TOLERANCE)]
    symmetry_tolerance: f64,

    /// A spacing larger than this many times the median spacing is a gap.
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_GAP_RATIO)]
    gap_ratio: f64,

    /// Points required on each side of a gap.
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_MIN_SIDE_POINTS)]
    min_side_points: usize,

    /// Analyze polylines one at a time instead of in parallel.
    #[arg(long)]
    sequential: bool,

    /// Write the drawing with analysis overlays to an SVG file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Output the analysis as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full analysis config as a JSON string.
    ///
    /// When provided, all other analysis parameter flags are ignored.
    /// The JSON must be a valid `AnalysisConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Occlusion mode selection.
#[derive(Clone, Copy, ValueEnum)]
enum Occlusion {
    /// Fill the gap along the best-fit line or circle.
    Connected,
    /// Bridge the gap with a curve matching the tangents at both ends.
    Disconnected,
}

/// Maps a [`OcclusionKind`] to the local CLI [`Occlusion`] enum.
const fn occlusion_from_pipeline(kind: OcclusionKind) -> Occlusion {
    match kind {
        OcclusionKind::Connected => Occlusion::Connected,
        OcclusionKind::Disconnected => Occlusion::Disconnected,
    }
}

/// The CLI default occlusion, derived from
/// [`AnalysisConfig::DEFAULT_OCCLUSION`] so the two cannot silently diverge.
const CLI_DEFAULT_OCCLUSION: Occlusion = occlusion_from_pipeline(AnalysisConfig::DEFAULT_OCCLUSION);

/// Build an [`AnalysisConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<AnalysisConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(AnalysisConfig {
        circle_preference: cli.circle_preference,
        resample_count: cli.resample_count,
        axis_steps: cli.axis_steps,
        max_rotation_order: cli.max_rotation_order,
        symmetry_tolerance: cli.symmetry_tolerance,
        occlusion: match cli.occlusion {
            Occlusion::Connected => OcclusionKind::Connected,
            Occlusion::Disconnected => OcclusionKind::Disconnected,
        },
        gap_ratio: cli.gap_ratio,
        min_side_points: cli.min_side_points,
        parallel: !cli.sequential,
        ..AnalysisConfig::default()
    })
}

/// Parse the input according to its file extension.
fn read_drawing(path: &Path) -> Result<Drawing, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase);
    let parsed = match extension.as_deref() {
        Some("csv") => strokefit_export::parse_csv(&text),
        Some("svg") => strokefit_export::parse_svg(&text),
        _ => {
            return Err(format!(
                "Unsupported input {}: expected a .csv or .svg file",
                path.display()
            ));
        }
    };
    parsed.map_err(|e| format!("Error parsing {}: {e}", path.display()))
}

/// One line per polyline for the human-readable report.
fn describe(entry: &AnalyzedPolyline) -> String {
    let analysis = &entry.analysis;
    let fit = analysis
        .regularization
        .best
        .map_or_else(|| "no fit".to_string(), |kind| kind.to_string());
    let symmetry = match &analysis.symmetry {
        Ok(report) => match report.rotational {
            Some(rotational) => format!("{} (order {})", report.kind, rotational.order),
            None => report.kind.to_string(),
        },
        Err(e) => format!("failed: {e}"),
    };
    let completion = match &analysis.completion {
        Ok(completed) if completed.gap.is_some() => {
            format!("{} points synthesized", completed.synthesized_count())
        }
        Ok(_) => "no gap".to_string(),
        Err(e) => format!("failed: {e}"),
    };
    format!(
        "path {:>3} polyline {:>3}: {:>5} pts | {fit:<6} | symmetry {symmetry} | {completion}",
        entry.path_index, entry.polyline_index, analysis.point_count,
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strokefit_pipeline=warn,strokefit_export=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let drawing = match read_drawing(&cli.input) {
        Ok(d) => d,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Input: {} ({} paths, {} polylines, {} points)",
        cli.input.display(),
        drawing.len(),
        drawing.polyline_count(),
        drawing.point_count(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!();

    let start = Instant::now();
    let analysis = match strokefit_pipeline::analyze_drawing(&drawing, &config) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Analysis error: {e}");
            return ExitCode::FAILURE;
        }
    };
    eprintln!(
        "Analyzed in {:.3}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    let summary = analysis.summary();
    if cli.json {
        let output = serde_json::json!({
            "config": config,
            "summary": summary,
            "analysis": analysis,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing analysis: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        for entry in &analysis.polylines {
            println!("{}", describe(entry));
        }
        println!();
        println!("{}", summary.report());
    }

    if let Some(ref svg_path) = cli.svg {
        let title = cli
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("strokefit");
        let desc = format!("occlusion={}", config.occlusion);
        let config_json = serde_json::to_string(&config).ok();
        let metadata = strokefit_export::SvgMetadata {
            title: Some(title),
            description: Some(&desc),
            config_json: config_json.as_deref(),
        };
        let svg = strokefit_export::to_svg(&drawing, Some(&analysis), &metadata);
        match std::fs::write(svg_path, &svg) {
            Ok(()) => {
                eprintln!(
                    "SVG written to {} ({} bytes)",
                    svg_path.display(),
                    svg.len(),
                );
            }
            Err(e) => {
                eprintln!("Error writing SVG to {}: {e}", svg_path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
