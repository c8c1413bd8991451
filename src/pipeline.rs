//! End-to-end run: ledger → cleaning → features → validation → sink.

use crate::{
    cleaning::clean,
    config::Config,
    error::Result,
    features::derive_features,
    ledger::{load_incremental, ProcessedLog, RunStats},
    sink::{write_partitioned, PartitionWrite},
    source::{BatchSource, CsvDirSource},
    tables::ReferenceTables,
    validation::{build_report, enforce, write_report, QualityReport},
};

/// Everything a successful run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub stats: RunStats,
    pub rows_cleaned: usize,
    pub report: QualityReport,
    pub partitions: Vec<PartitionWrite>,
}

/// Run against the CSV directory and ledger named by `config`.
pub fn run(config: &Config, tables: &ReferenceTables) -> Result<RunOutcome> {
    // ---
    let source = CsvDirSource::new(&config.raw_dir);
    let mut log = ProcessedLog::open(config.ledger_path())?;
    run_with(&source, &mut log, config, tables)
}

/// Run one pipeline pass over an arbitrary batch source.
///
/// The report is always written before fail-fast is evaluated; on a
/// quality failure the partitioned sink is skipped and the error returned.
pub fn run_with<S>(
    source: &S,
    log: &mut ProcessedLog,
    config: &Config,
    tables: &ReferenceTables,
) -> Result<RunOutcome>
where
    S: BatchSource + ?Sized,
{
    // ---
    tracing::info!("Starting pipeline run");

    // Step 1: absorb unseen batches
    tracing::debug!("Pipeline - Step 1");
    let (raw, stats) = load_incremental(source, log)?;
    tracing::info!(
        "Run {}: {} new batches, {} processed, {} rows, {} failed",
        stats.run_id,
        stats.new_batches,
        stats.processed_now,
        stats.rows_loaded,
        stats.failed_batches.len()
    );

    // Step 2: clean
    tracing::debug!("Pipeline - Step 2");
    let cleaned = clean(raw);
    let rows_cleaned = cleaned.len();

    // Step 3: enrich
    tracing::debug!("Pipeline - Step 3");
    let enriched = derive_features(cleaned, tables, config.target_tz);

    // Step 4: validate, persist the report, then decide
    tracing::debug!("Pipeline - Step 4");
    let report = build_report(&enriched, tables, config.target_tz);
    write_report(&report, &config.report_path)?;
    if let Err(failure) = enforce(&report, &config.fail_fast_policy()) {
        tracing::error!("Fail-fast triggered: {}", failure);
        return Err(failure.into());
    }

    // Step 5: partitioned output
    tracing::debug!("Pipeline - Step 5");
    let partitions = write_partitioned(&enriched, &config.processed_dir)?;

    tracing::info!("Pipeline complete, {} rows enriched", enriched.len());
    Ok(RunOutcome {
        stats,
        rows_cleaned,
        report,
        partitions,
    })
}
