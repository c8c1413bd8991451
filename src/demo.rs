//! Demo raw batches for trying the pipeline locally.

use std::{fs, path::{Path, PathBuf}};

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::Serialize;

use crate::error::Result;

const DEMO_READING_TYPES: [&str; 5] = [
    "temperature",
    "humidity",
    "soil_moisture",
    "light",
    "battery_level",
];

/// Shape of the generated batches.
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub dates: Vec<String>,
    pub sensors: usize,
    pub rows_per_sensor: usize,
    pub seed: u64,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            dates: vec![
                "2025-06-05".to_string(),
                "2025-06-06".to_string(),
                "2025-06-07".to_string(),
            ],
            sensors: 5,
            rows_per_sensor: 10,
            seed: 42,
        }
    }
}

#[derive(Serialize)]
struct DemoRow<'a> {
    sensor_id: &'a str,
    timestamp: String,
    reading_type: &'a str,
    value: f64,
    battery_level: f64,
}

/// Write one `<date>.csv` batch per date into `dir`, one reading per
/// minute from noon for each sensor. Returns the written paths.
pub fn generate_demo_batches(dir: &Path, options: &DemoOptions) -> Result<Vec<PathBuf>> {
    // ---
    fs::create_dir_all(dir)?;
    let mut rng = StdRng::seed_from_u64(options.seed);
    let sensors: Vec<String> = (1..=options.sensors).map(|i| format!("sensor_{i}")).collect();

    let mut written = Vec::with_capacity(options.dates.len());
    for date in &options.dates {
        let path = dir.join(format!("{date}.csv"));
        let mut writer = csv::Writer::from_path(&path)?;

        for sensor in &sensors {
            for i in 0..options.rows_per_sensor {
                let reading_type = DEMO_READING_TYPES
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or("temperature");
                writer.serialize(DemoRow {
                    sensor_id: sensor,
                    timestamp: format!("{date}T{:02}:{:02}:00Z", 12 + i / 60, i % 60),
                    reading_type,
                    value: rng.gen_range(10.0..100.0),
                    battery_level: rng.gen_range(20.0..100.0),
                })?;
            }
        }
        writer.flush()?;

        tracing::info!("Generated demo batch {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::source::{BatchSource, CsvDirSource};
    use tempfile::TempDir;

    #[test]
    fn test_demo_batches_pass_schema_check() {
        // ---
        let dir = TempDir::new().unwrap();
        let options = DemoOptions::default();

        let paths = generate_demo_batches(dir.path(), &options).unwrap();
        assert_eq!(paths.len(), 3);

        let source = CsvDirSource::new(dir.path());
        let batches = source.list_batches().unwrap();
        assert_eq!(batches, vec!["2025-06-05.csv", "2025-06-06.csv", "2025-06-07.csv"]);

        let rows = source.read_batch("2025-06-05.csv").unwrap();
        assert_eq!(rows.len(), options.sensors * options.rows_per_sensor);
        assert!(rows.iter().all(|r| r.value.as_f64().is_some()));
    }

    #[test]
    fn test_same_seed_same_output() {
        // ---
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let options = DemoOptions {
            dates: vec!["2025-06-05".to_string()],
            ..DemoOptions::default()
        };

        generate_demo_batches(a.path(), &options).unwrap();
        generate_demo_batches(b.path(), &options).unwrap();

        assert_eq!(
            fs::read_to_string(a.path().join("2025-06-05.csv")).unwrap(),
            fs::read_to_string(b.path().join("2025-06-05.csv")).unwrap()
        );
    }
}
