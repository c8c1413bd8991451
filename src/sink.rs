//! Partitioned output writer.
//!
//! Enriched readings are grouped by `(date, sensor_id)` and written to
//! `<root>/date=<YYYY-MM-DD>/sensor_id=<id>/data.csv`.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;

use crate::{error::Result, models::EnrichedReading};

pub const PARTITION_FILE: &str = "data.csv";

/// One file produced by [`write_partitioned`].
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionWrite {
    pub path: PathBuf,
    pub rows: usize,
}

pub fn partition_dir(root: &Path, date: NaiveDate, sensor_id: &str) -> PathBuf {
    root.join(format!("date={date}"))
        .join(format!("sensor_id={sensor_id}"))
}

/// Write every partition, replacing any file already at that path.
pub fn write_partitioned(readings: &[EnrichedReading], root: &Path) -> Result<Vec<PartitionWrite>> {
    // ---
    if readings.is_empty() {
        tracing::info!("No data to write");
        return Ok(Vec::new());
    }

    let mut partitions: BTreeMap<(NaiveDate, &str), Vec<&EnrichedReading>> = BTreeMap::new();
    for r in readings {
        partitions
            .entry((r.date, r.sensor_id.as_str()))
            .or_default()
            .push(r);
    }

    let mut written = Vec::with_capacity(partitions.len());
    for ((date, sensor_id), rows) in partitions {
        let dir = partition_dir(root, date, sensor_id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(PARTITION_FILE);

        let mut writer = csv::Writer::from_path(&path)?;
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        tracing::debug!("Wrote {} rows -> {}", rows.len(), path.display());
        written.push(PartitionWrite {
            path,
            rows: rows.len(),
        });
    }

    tracing::info!(
        "Wrote {} rows across {} partitions under {}",
        readings.len(),
        written.len(),
        root.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{
        cleaning::clean,
        features::derive_features,
        models::{Numeric, RawReading},
        tables::ReferenceTables,
    };
    use tempfile::TempDir;

    fn raw(sensor: &str, ts: &str, value: f64) -> RawReading {
        RawReading {
            sensor_id: Some(sensor.to_string()),
            timestamp: Some(ts.to_string()),
            reading_type: Some("temperature".to_string()),
            value: Numeric::Value(value),
            battery_level: Numeric::Missing,
        }
    }

    #[test]
    fn test_partitions_by_date_and_sensor() {
        // ---
        let readings = derive_features(
            clean(vec![
                raw("s1", "2025-06-05T08:00:00Z", 20.0),
                raw("s1", "2025-06-05T09:00:00Z", 21.0),
                raw("s2", "2025-06-05T08:00:00Z", 22.0),
                raw("s1", "2025-06-06T08:00:00Z", 23.0),
            ]),
            &ReferenceTables::default(),
            chrono_tz::UTC,
        );
        let dir = TempDir::new().unwrap();

        let written = write_partitioned(&readings, dir.path()).unwrap();

        let layout: Vec<(String, usize)> = written
            .iter()
            .map(|w| {
                let rel = w.path.strip_prefix(dir.path()).unwrap();
                (rel.to_string_lossy().replace('\\', "/"), w.rows)
            })
            .collect();
        assert_eq!(
            layout,
            vec![
                ("date=2025-06-05/sensor_id=s1/data.csv".to_string(), 2),
                ("date=2025-06-05/sensor_id=s2/data.csv".to_string(), 1),
                ("date=2025-06-06/sensor_id=s1/data.csv".to_string(), 1),
            ]
        );

        let text = fs::read_to_string(&written[0].path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "sensor_id,timestamp,timestamp_iso,date,reading_type,value,battery_level,\
             calibrated_value,daily_avg_value,rolling_7d_avg,anomalous_reading"
        );
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn test_empty_input_writes_nothing() {
        // ---
        let dir = TempDir::new().unwrap();
        assert!(write_partitioned(&[], dir.path()).unwrap().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
