//! Batch cleaning, feature derivation and data-quality validation for
//! time-stamped sensor readings.
//!
//! Modules follow the Explicit Module Boundary Pattern (EMBP): each stage
//! lives in its own module and the gateway below re-exports the surface
//! the binary and the integration tests use.

pub mod cleaning;
pub mod config;
pub mod demo;
pub mod error;
pub mod features;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod tables;
pub mod validation;

pub use cleaning::clean;
pub use config::Config;
pub use error::{IngestError, PipelineError, QualityFailure};
pub use features::derive_features;
pub use ledger::{load_incremental, unseen_batches, ProcessedLog, RunStats};
pub use models::{EnrichedReading, Numeric, RawReading, Reading, ReadingType};
pub use pipeline::{run, run_with, RunOutcome};
pub use source::{BatchSource, CsvDirSource};
pub use tables::ReferenceTables;
pub use validation::{build_report, enforce, FailFastPolicy, QualityReport};
