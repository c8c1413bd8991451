//! Raw batch sources.
//!
//! A batch is one CSV file in the raw data directory, identified by its
//! file name. Reading a batch validates the header before any row is
//! returned, so a schema mismatch never reaches the ledger.

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
};

use csv::StringRecord;

use crate::{
    error::IngestError,
    models::{Numeric, RawReading},
};

/// Columns every raw batch must carry. Extra columns are ignored.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "sensor_id",
    "timestamp",
    "reading_type",
    "value",
    "battery_level",
];

// ---

/// Ordered listing of batches plus a way to read one.
pub trait BatchSource {
    /// Every batch currently available, processed or not.
    fn list_batches(&self) -> std::io::Result<Vec<String>>;

    /// Read and schema-check a single batch.
    fn read_batch(&self, batch_id: &str) -> Result<Vec<RawReading>, IngestError>;
}

/// Batches stored as `*.csv` files in a single directory.
#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    // ---
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BatchSource for CsvDirSource {
    // ---
    fn list_batches(&self) -> std::io::Result<Vec<String>> {
        // ---
        fs::create_dir_all(&self.dir)?;

        let mut batches = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.to_ascii_lowercase().ends_with(".csv") {
                batches.push(name);
            }
        }
        batches.sort();
        Ok(batches)
    }

    fn read_batch(&self, batch_id: &str) -> Result<Vec<RawReading>, IngestError> {
        // ---
        let path = self.dir.join(batch_id);
        let csv_err = |source| IngestError::Csv {
            batch: batch_id.to_string(),
            source,
        };

        let file = fs::File::open(&path).map_err(|source| IngestError::Io {
            batch: batch_id.to_string(),
            source,
        })?;
        let mut reader = csv::ReaderBuilder::new().flexible(false).from_reader(file);

        let headers = reader.headers().map_err(csv_err)?.clone();
        let columns = ColumnIndex::resolve(batch_id, &headers)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            rows.push(columns.reading(&record));
        }

        tracing::debug!("Read {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }
}

// ---

/// Positions of the required columns within a batch header.
#[derive(Debug)]
pub(crate) struct ColumnIndex {
    sensor_id: usize,
    timestamp: usize,
    reading_type: usize,
    value: usize,
    battery_level: usize,
}

impl ColumnIndex {
    // ---
    pub(crate) fn resolve(batch_id: &str, headers: &StringRecord) -> Result<Self, IngestError> {
        // ---
        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim(), idx))
            .collect();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !positions.contains_key(*col))
            .map(|col| col.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(IngestError::Schema {
                batch: batch_id.to_string(),
                required: REQUIRED_COLUMNS.to_vec(),
                missing,
            });
        }

        Ok(Self {
            sensor_id: positions["sensor_id"],
            timestamp: positions["timestamp"],
            reading_type: positions["reading_type"],
            value: positions["value"],
            battery_level: positions["battery_level"],
        })
    }

    fn reading(&self, record: &StringRecord) -> RawReading {
        // ---
        let text = |idx: usize| {
            record
                .get(idx)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        RawReading {
            sensor_id: text(self.sensor_id),
            timestamp: text(self.timestamp),
            reading_type: text(self.reading_type),
            value: Numeric::parse(record.get(self.value)),
            battery_level: Numeric::parse(record.get(self.battery_level)),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) {
        fs::write(dir.path().join(name), body).unwrap();
    }

    #[test]
    fn test_lists_only_csv_files_sorted() {
        // ---
        let dir = TempDir::new().unwrap();
        write(&dir, "2025-06-07.csv", "");
        write(&dir, "2025-06-05.csv", "");
        write(&dir, "notes.txt", "");
        fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let source = CsvDirSource::new(dir.path());
        let batches = source.list_batches().unwrap();
        assert_eq!(batches, vec!["2025-06-05.csv", "2025-06-07.csv"]);
    }

    #[test]
    fn test_reads_rows_with_extra_columns_and_blanks() {
        // ---
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "batch.csv",
            "site,sensor_id,timestamp,reading_type,value,battery_level\n\
             north,s1,2025-06-05T12:00:00Z,temperature,21.5,88\n\
             north,s2,2025-06-05T12:01:00Z,humidity,,low\n",
        );

        let rows = CsvDirSource::new(dir.path()).read_batch("batch.csv").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sensor_id.as_deref(), Some("s1"));
        assert_eq!(rows[0].value, Numeric::Value(21.5));
        assert_eq!(rows[0].battery_level, Numeric::Value(88.0));
        assert_eq!(rows[1].value, Numeric::Missing);
        assert_eq!(rows[1].battery_level, Numeric::Invalid("low".to_string()));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        // ---
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "bad.csv",
            "sensor_id,timestamp,reading_type,value\ns1,2025-06-05T12:00:00Z,light,100\n",
        );

        let err = CsvDirSource::new(dir.path())
            .read_batch("bad.csv")
            .unwrap_err();
        match err {
            IngestError::Schema { batch, missing, .. } => {
                assert_eq!(batch, "bad.csv");
                assert_eq!(missing, vec!["battery_level".to_string()]);
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }
}
