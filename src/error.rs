//! Error taxonomy for the pipeline.
//!
//! Batch-level problems ([`IngestError`]) are collected into run stats and
//! never abort a run. [`QualityFailure`] is the opt-in hard stop raised by
//! the validator, kept separate so callers can tell it apart from I/O.

use thiserror::Error;

use crate::models::ReadingType;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read batch {batch}: {source}")]
    Io {
        batch: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in batch {batch}: {source}")]
    Csv {
        batch: String,
        #[source]
        source: csv::Error,
    },

    #[error("Schema mismatch in {batch}. Required: {required:?}, missing: {missing:?}")]
    Schema {
        batch: String,
        required: Vec<&'static str>,
        missing: Vec<String>,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QualityFailure {
    #[error("{count} rows carry non-numeric value or battery_level (allowed: {threshold})")]
    InvalidTypes { count: u64, threshold: u64 },

    #[error("{reading_type} is missing {pct:.2}% of values (allowed: {threshold:.2}%)")]
    MissingValues {
        reading_type: ReadingType,
        pct: f64,
        threshold: f64,
    },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("Data quality check failed: {0}")]
    Quality(#[from] QualityFailure),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
