//! Configuration loader for the `sensorflow` batch pipeline.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::{env, path::PathBuf};

use anyhow::{anyhow, Result};
use chrono_tz::Tz;

use crate::{tables::ReferenceTables, validation::FailFastPolicy};

/// Parse an optional environment variable into `$ty`, falling back to a default.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional string environment variable with a default.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

pub const LEDGER_FILE: &str = "processed_files.txt";

/// Strongly typed pipeline configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Directory scanned for raw `*.csv` batches.
    pub raw_dir: PathBuf,

    /// Root of the partitioned output; also holds the ingestion ledger.
    pub processed_dir: PathBuf,

    /// Where the data quality report is written.
    pub report_path: PathBuf,

    /// Zone used for `timestamp_iso` and calendar dates.
    pub target_tz: Tz,

    /// Optional JSON file overriding the built-in reference tables.
    pub reference_tables: Option<PathBuf>,

    pub fail_fast: bool,
    pub max_pct_missing: f64,
    pub max_invalid_types: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            report_path: PathBuf::from("data_quality_report.csv"),
            target_tz: chrono_tz::Asia::Kolkata,
            reference_tables: None,
            fail_fast: false,
            max_pct_missing: 10.0,
            max_invalid_types: 0,
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `RAW_DATA_DIR` – raw batch directory (default: `data/raw`)
/// - `PROCESSED_DIR` – output root and ledger location (default: `data/processed`)
/// - `REPORT_PATH` – quality report file (default: `data_quality_report.csv`)
/// - `PIPELINE_TZ` – IANA zone name (default: `Asia/Kolkata`)
/// - `REFERENCE_TABLES` – JSON file with `expected_ranges` / `calibration`
/// - `FAIL_FAST` – `true|false` (default: false)
/// - `QUALITY_MAX_PCT_MISSING` – fail-fast missing-value threshold (default: 10)
/// - `QUALITY_MAX_INVALID_TYPES` – fail-fast invalid-type threshold (default: 0)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = Config::default();

    let raw_dir = PathBuf::from(env_or!("RAW_DATA_DIR", "data/raw"));
    let processed_dir = PathBuf::from(env_or!("PROCESSED_DIR", "data/processed"));
    let report_path = PathBuf::from(env_or!("REPORT_PATH", "data_quality_report.csv"));
    let target_tz = env::var("PIPELINE_TZ")
        .ok()
        .map(|name| {
            name.trim()
                .parse::<Tz>()
                .map_err(|e| anyhow!("Invalid PIPELINE_TZ: {}", e))
        })
        .transpose()?
        .unwrap_or(defaults.target_tz);
    let reference_tables = env::var("REFERENCE_TABLES").ok().map(PathBuf::from);
    let fail_fast = parse_env!("FAIL_FAST", bool, defaults.fail_fast);
    let max_pct_missing = parse_env!("QUALITY_MAX_PCT_MISSING", f64, defaults.max_pct_missing);
    let max_invalid_types = parse_env!("QUALITY_MAX_INVALID_TYPES", u64, defaults.max_invalid_types);

    Ok(Config {
        raw_dir,
        processed_dir,
        report_path,
        target_tz,
        reference_tables,
        fail_fast,
        max_pct_missing,
        max_invalid_types,
    })
}

impl Config {
    // ---
    pub fn ledger_path(&self) -> PathBuf {
        self.processed_dir.join(LEDGER_FILE)
    }

    pub fn fail_fast_policy(&self) -> FailFastPolicy {
        FailFastPolicy {
            enabled: self.fail_fast,
            max_invalid_types: self.max_invalid_types,
            max_pct_missing: self.max_pct_missing,
        }
    }

    /// Built-in tables, or the ones named by `REFERENCE_TABLES`.
    pub fn load_tables(&self) -> Result<ReferenceTables> {
        // ---
        match &self.reference_tables {
            Some(path) => ReferenceTables::from_json_file(path)
                .map_err(|e| anyhow!("Failed to load reference tables '{}': {}", path.display(), e)),
            None => Ok(ReferenceTables::default()),
        }
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        let tables = self
            .reference_tables
            .as_ref()
            .map_or_else(|| "(built-in)".to_string(), |p| p.display().to_string());

        tracing::info!("Configuration loaded:");
        tracing::info!("  RAW_DATA_DIR              : {}", self.raw_dir.display());
        tracing::info!("  PROCESSED_DIR             : {}", self.processed_dir.display());
        tracing::info!("  REPORT_PATH               : {}", self.report_path.display());
        tracing::info!("  PIPELINE_TZ               : {}", self.target_tz);
        tracing::info!("  REFERENCE_TABLES          : {}", tables);
        tracing::info!("  FAIL_FAST                 : {}", self.fail_fast);
        tracing::info!("  QUALITY_MAX_PCT_MISSING   : {}", self.max_pct_missing);
        tracing::info!("  QUALITY_MAX_INVALID_TYPES : {}", self.max_invalid_types);
    }
}
