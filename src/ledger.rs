//! Ingestion ledger: which raw batches have already been absorbed.
//!
//! The ledger is an append-only text file, one batch id per line. A batch
//! moves from unseen to processed exactly once, and only after its rows
//! were read and passed the schema check. Failed batches stay unseen and
//! are retried on the next run.

use std::{
    collections::BTreeSet,
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{error::Result, models::RawReading, source::BatchSource};

// ---

/// Durable set of processed batch ids.
#[derive(Debug)]
pub struct ProcessedLog {
    // ---
    path: PathBuf,
    entries: BTreeSet<String>,
}

impl ProcessedLog {
    // ---
    /// Open the log at `path`, creating parent directories as needed.
    /// A missing file is an empty log.
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        // ---
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            fs::read_to_string(&path)?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect()
        } else {
            BTreeSet::new()
        };

        Ok(Self { path, entries })
    }

    pub fn contains(&self, batch_id: &str) -> bool {
        self.entries.contains(batch_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append `batch_id` and sync it to disk before returning.
    ///
    /// Returns `false` without touching the file when the id is already
    /// recorded.
    pub fn mark_processed(&mut self, batch_id: &str) -> std::io::Result<bool> {
        // ---
        if self.contains(batch_id) {
            return Ok(false);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{batch_id}")?;
        file.sync_data()?;

        self.entries.insert(batch_id.to_string());
        Ok(true)
    }
}

/// Batches from `all_batches` not yet in `log`, deduplicated and in
/// lexicographic order.
pub fn unseen_batches(all_batches: &[String], log: &ProcessedLog) -> Vec<String> {
    // ---
    all_batches
        .iter()
        .filter(|id| !log.contains(id))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ---

/// A batch that could not be absorbed this run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchFailure {
    pub batch: String,
    pub error: String,
}

/// Aggregated statistics for one ingestion pass.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    // ---
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,

    /// Batches listed by the source, processed or not.
    pub total_batches: usize,

    /// Batches not yet in the ledger at the start of the run.
    pub new_batches: usize,

    /// Batches read and marked processed during this run.
    pub processed_now: usize,

    pub rows_loaded: usize,
    pub failed_batches: Vec<BatchFailure>,
}

/// Read every unseen batch, marking each as processed once its rows are in
/// memory. Per-batch failures are recorded in the stats; only listing
/// errors and ledger write errors abort the pass.
pub fn load_incremental<S>(source: &S, log: &mut ProcessedLog) -> Result<(Vec<RawReading>, RunStats)>
where
    S: BatchSource + ?Sized,
{
    // ---
    let all_batches = source.list_batches()?;
    let pending = unseen_batches(&all_batches, log);

    let mut stats = RunStats {
        run_id: Uuid::new_v4(),
        started_at: Utc::now(),
        total_batches: all_batches.len(),
        new_batches: pending.len(),
        processed_now: 0,
        rows_loaded: 0,
        failed_batches: Vec::new(),
    };

    tracing::info!(
        "Ledger has {} entries; {} of {} batches are new",
        log.len(),
        stats.new_batches,
        stats.total_batches
    );

    let mut rows = Vec::new();
    for batch in pending {
        match source.read_batch(&batch) {
            Ok(batch_rows) => {
                log.mark_processed(&batch)?;
                stats.processed_now += 1;
                stats.rows_loaded += batch_rows.len();
                tracing::debug!("Absorbed {} ({} rows)", batch, batch_rows.len());
                rows.extend(batch_rows);
            }
            Err(e) => {
                tracing::warn!("Skipping batch {}: {}", batch, e);
                stats.failed_batches.push(BatchFailure {
                    batch,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok((rows, stats))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::error::IngestError;
    use crate::models::Numeric;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// In-memory source; `None` stands for a batch with a bad header.
    struct MemorySource {
        batches: HashMap<String, Option<Vec<RawReading>>>,
    }

    impl BatchSource for MemorySource {
        fn list_batches(&self) -> std::io::Result<Vec<String>> {
            Ok(self.batches.keys().cloned().collect())
        }

        fn read_batch(&self, batch_id: &str) -> std::result::Result<Vec<RawReading>, IngestError> {
            match self.batches.get(batch_id) {
                Some(Some(rows)) => Ok(rows.clone()),
                _ => Err(IngestError::Schema {
                    batch: batch_id.to_string(),
                    required: crate::source::REQUIRED_COLUMNS.to_vec(),
                    missing: vec!["value".to_string()],
                }),
            }
        }
    }

    fn row(sensor: &str) -> RawReading {
        RawReading {
            sensor_id: Some(sensor.to_string()),
            timestamp: Some("2025-06-05T12:00:00Z".to_string()),
            reading_type: Some("temperature".to_string()),
            value: Numeric::Value(21.0),
            battery_level: Numeric::Value(90.0),
        }
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unseen_excludes_logged_and_is_idempotent() {
        // ---
        let dir = TempDir::new().unwrap();
        let mut log = ProcessedLog::open(dir.path().join("processed_files.txt")).unwrap();
        log.mark_processed("b.csv").unwrap();

        let all = ids(&["c.csv", "a.csv", "b.csv", "a.csv"]);
        let first = unseen_batches(&all, &log);
        let second = unseen_batches(&all, &log);

        assert_eq!(first, ids(&["a.csv", "c.csv"]));
        assert_eq!(first, second);
    }

    #[test]
    fn test_mark_processed_is_durable_and_writes_once() {
        // ---
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed").join("processed_files.txt");

        let mut log = ProcessedLog::open(&path).unwrap();
        assert!(log.is_empty());
        assert!(log.mark_processed("2025-06-05.csv").unwrap());
        assert!(!log.mark_processed("2025-06-05.csv").unwrap());

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "2025-06-05.csv\n");

        let reopened = ProcessedLog::open(&path).unwrap();
        assert!(reopened.contains("2025-06-05.csv"));
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_failed_batch_is_reported_and_stays_unseen() {
        // ---
        let dir = TempDir::new().unwrap();
        let mut log = ProcessedLog::open(dir.path().join("log.txt")).unwrap();
        let source = MemorySource {
            batches: HashMap::from([
                ("good.csv".to_string(), Some(vec![row("s1"), row("s2")])),
                ("bad.csv".to_string(), None),
            ]),
        };

        let (rows, stats) = load_incremental(&source, &mut log).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(stats.total_batches, 2);
        assert_eq!(stats.new_batches, 2);
        assert_eq!(stats.processed_now, 1);
        assert_eq!(stats.rows_loaded, 2);
        assert_eq!(stats.failed_batches.len(), 1);
        assert_eq!(stats.failed_batches[0].batch, "bad.csv");
        assert!(stats.failed_batches[0].error.contains("Schema mismatch"));

        assert!(log.contains("good.csv"));
        assert!(!log.contains("bad.csv"));

        // Second pass only retries the failed batch.
        let (rows, stats) = load_incremental(&source, &mut log).unwrap();
        assert!(rows.is_empty());
        assert_eq!(stats.new_batches, 1);
        assert_eq!(stats.processed_now, 0);
        assert_eq!(stats.failed_batches.len(), 1);
    }
}
