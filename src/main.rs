//! Application entry point for the `sensorflow` batch pipeline.
//!
//! This binary orchestrates a run of the sensor quality pipeline, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Loading the static reference tables
//! - Running ingestion, cleaning, feature derivation, validation and output
//!   via the `pipeline` gateway (EMBP pattern)
//!
//! # Environment Variables
//! - `RAW_DATA_DIR`, `PROCESSED_DIR`, `REPORT_PATH`, `PIPELINE_TZ`,
//!   `REFERENCE_TABLES`, `FAIL_FAST`, `QUALITY_MAX_*` – see `config`
//! - `SENSORFLOW_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `SENSORFLOW_SPAN_EVENTS` (optional) – span event mode for tracing
use std::env;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use sensorflow_quality::{config, demo, pipeline};

/// Batch cleaning and data-quality pipeline for sensor readings
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Process every unseen raw batch and write the quality report.
    Run {
        /// Abort before writing output when quality thresholds are exceeded.
        #[arg(long)]
        fail_fast: bool,
    },
    /// Generate demo raw batches into RAW_DATA_DIR.
    Demo {
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Readings per sensor per batch.
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
}

// ---

fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let mut cfg = config::load_from_env()?;

    match cli.command {
        Commands::Run { fail_fast } => {
            cfg.fail_fast |= fail_fast;
            cfg.log_config();

            let tables = cfg.load_tables()?;
            let outcome = pipeline::run(&cfg, &tables)?;

            println!("{}", serde_json::to_string_pretty(&outcome.stats)?);
            tracing::info!(
                "{} rows cleaned, {} partitions written, report at {}",
                outcome.rows_cleaned,
                outcome.partitions.len(),
                cfg.report_path.display()
            );
        }
        Commands::Demo { seed, rows } => {
            let options = demo::DemoOptions {
                seed,
                rows_per_sensor: rows,
                ..demo::DemoOptions::default()
            };
            let paths = demo::generate_demo_batches(&cfg.raw_dir, &options)?;
            tracing::info!("Generated {} demo batches in {}", paths.len(), cfg.raw_dir.display());
        }
    }

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `SENSORFLOW_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `SENSORFLOW_LOG_LEVEL` env var
///
/// Logs go to stderr so the run summary on stdout stays machine readable.
fn init_tracing() {
    // ---
    let span_events = match env::var("SENSORFLOW_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stderr().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to SENSORFLOW_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("SENSORFLOW_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
