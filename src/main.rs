//! Clan Points OCR
//!
//! Reads a clan leaderboard screenshot with Tesseract and writes the
//! players' names and point totals to a CSV file.

mod config;
mod csv_writer;
mod error;
mod matcher;
mod ocr;
mod paths;
mod pipeline;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use config::{ExtractorConfig, LayoutMode};
use error::ExtractError;
use matcher::values::parse_points;
use ocr::TesseractEngine;

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("clan_points_ocr.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Logs only when debug mode is on.
pub fn log_debug(msg: &str) {
    if VERBOSE.load(Ordering::Relaxed) {
        log(msg);
    }
}

fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

#[derive(Parser, Debug)]
#[command(version, about = "Extract clan member names and points from a leaderboard screenshot")]
struct Args {
    /// Screenshot to read (defaults to image_settings.input_image)
    image: Option<PathBuf>,

    /// Skip debug output and debug images
    #[arg(long)]
    quick: bool,

    /// Configuration file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// CSV file to write (defaults to image_settings.output_csv)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Only check that Tesseract is installed
    #[arg(long)]
    check_deps: bool,

    /// Override the processing layout
    #[arg(long, value_enum)]
    layout: Option<LayoutMode>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = paths::ensure_directories() {
        eprintln!("Warning: could not create logs directory: {}", e);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    log("Clan Points OCR");
    log("===============");

    let mut config = match paths::locate_config(&args.config) {
        Some(path) => ExtractorConfig::load(&path),
        None => ExtractorConfig::load(&args.config),
    };

    if args.quick {
        config.processing_settings.debug_mode = false;
        config.processing_settings.save_debug_images = false;
    }
    set_verbose(config.processing_settings.debug_mode);

    if let Some(output) = &args.output {
        config.image_settings.output_csv = output.display().to_string();
    }
    if let Some(layout) = args.layout {
        config.processing_settings.layout = layout;
    }

    if args.check_deps {
        let version = ocr::check_dependencies(&config.ocr_settings)?;
        log(&format!("Tesseract OK: {}", version));
        return Ok(());
    }

    let image_path = args
        .image
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.image_settings.input_image));
    if !image_path.exists() {
        return Err(ExtractError::ImageNotFound(image_path).into());
    }

    let tesseract = ocr::locate_tesseract(&config.ocr_settings)?;
    let engine = TesseractEngine::new(tesseract, &config.ocr_settings.language);

    log(&format!("Processing image: {}", image_path.display()));
    let debug_dir = config
        .processing_settings
        .save_debug_images
        .then(|| PathBuf::from(&config.processing_settings.debug_dir));

    let extraction =
        pipeline::run_extraction(&mut config, &image_path, &engine, debug_dir.as_deref())?;
    if extraction.records.is_empty() {
        return Err(ExtractError::NoRecords.into());
    }

    let output_path = PathBuf::from(&config.image_settings.output_csv);
    csv_writer::write_records(
        &output_path,
        csv_writer::name_header(extraction.layout),
        &extraction.records,
    )?;

    log_summary(&extraction.records, &output_path);
    Ok(())
}

fn log_summary(records: &[matcher::AssignmentRecord], output_path: &Path) {
    log(&format!(
        "Extracted {} players, saved to {}",
        records.len(),
        output_path.display()
    ));
    for record in records {
        log(&format!("  {}: {}", record.name, record.points));
    }

    let points: Vec<u32> = records
        .iter()
        .filter_map(|r| parse_points(&r.points))
        .collect();
    if let (Some(min), Some(max)) = (points.iter().min(), points.iter().max()) {
        log(&format!("Points range: {} - {}", min, max));
    }
}

/// Prints the error chain plus a hint for failures the user can fix.
fn report(err: &anyhow::Error) {
    log(&format!("Error: {:#}", err));

    match err.downcast_ref::<ExtractError>() {
        Some(ExtractError::ImageNotFound(_)) => {
            log("Pass the screenshot path as an argument or set image_settings.input_image");
        }
        Some(ExtractError::NoRecords) => {
            log("Suggestions:");
            log("  1. Check that the screenshot shows the points leaderboard");
            log("  2. Run without --quick and inspect the debug images");
            log("  3. Widen validation_settings min_points/max_points or the roster ranges");
        }
        _ => {}
    }
}
