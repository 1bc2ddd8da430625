// ============================================================================
// PaintCore CLI: headless drawing via command scripts
// ============================================================================
//
// Usage examples:
//   paintcore --script scene.txt --output scene.png
//   paintcore -W 320 -H 240 --script doodle.txt -o doodle.png
//   paintcore --background photo.png --script marks.txt -o marked.png
//   paintcore --config engine.toml --script scene.txt -o scene.png --verbose
//
// The core never encodes files; this front end loads the optional
// background image and writes the flattened composite as PNG.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::RgbaImage;

use crate::config::EngineConfig;
use crate::engine::DrawingEngine;
use crate::error::Result;
use crate::ops::scripting::{run_script, ScriptReport};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PaintCore headless renderer.
///
/// Run a drawing command script against a fresh canvas and save the
/// flattened result, no window required.
#[derive(Parser, Debug)]
#[command(
    name = "paintcore",
    about = "PaintCore headless raster renderer",
    long_about = "Run a line-based drawing script (pencil, shapes, fills, layers,\n\
                  undo/redo) against a new canvas and write the flattened image.\n\n\
                  Example:\n  \
                  paintcore --script scene.txt --output scene.png"
)]
pub struct CliArgs {
    /// Canvas width in pixels (overrides the config file).
    #[arg(short = 'W', long, value_name = "PX")]
    pub width: Option<u32>,

    /// Canvas height in pixels (overrides the config file).
    #[arg(short = 'H', long, value_name = "PX")]
    pub height: Option<u32>,

    /// Engine configuration file (TOML).
    #[arg(short, long, value_name = "FILE.toml")]
    pub config: Option<PathBuf>,

    /// Image loaded as a new bottom layer before the script runs.
    #[arg(short, long, value_name = "IMAGE")]
    pub background: Option<PathBuf>,

    /// Command script to execute.  Without one the blank canvas is written.
    #[arg(short, long, value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Output PNG path.
    #[arg(short, long, value_name = "FILE.png")]
    pub output: PathBuf,

    /// Session log file (default: the per-user data directory).
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print command counts and timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Build the engine from the arguments, run the script and return the
/// flattened image.
pub fn render(args: &CliArgs) -> Result<(RgbaImage, ScriptReport)> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(w) = args.width {
        config.width = w;
    }
    if let Some(h) = args.height {
        config.height = h;
    }

    let mut engine = DrawingEngine::with_config(config)?;

    if let Some(path) = &args.background {
        let image = image::open(path)?.to_rgba8();
        engine.load_image_as_background(&image)?;
    }

    let report = match &args.script {
        Some(path) => {
            let source = std::fs::read_to_string(path)?;
            run_script(&mut engine, &source)?
        }
        None => ScriptReport::default(),
    };

    engine.finish_pending_fill()?;
    Ok((engine.render_composite()?, report))
}

/// Run the CLI and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();

    let (image, report) = match render(&args) {
        Ok(result) => result,
        Err(e) => {
            log::error!("render failed: {}", e);
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = image.save_with_format(&args.output, image::ImageFormat::Png) {
        log::error!("could not write '{}': {}", args.output.display(), e);
        eprintln!("error: could not write '{}': {}", args.output.display(), e);
        return ExitCode::FAILURE;
    }

    log::info!(
        "wrote {} ({}x{}), {} commands, {} applied",
        args.output.display(),
        image.width(),
        image.height(),
        report.commands,
        report.applied
    );
    if args.verbose {
        println!(
            "{}: {}x{}, {} commands ({} applied) in {:.1} ms",
            args.output.display(),
            image.width(),
            image.height(),
            report.commands,
            report.applied,
            start.elapsed().as_secs_f64() * 1000.0
        );
    }
    ExitCode::SUCCESS
}
