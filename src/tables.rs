//! Static reference tables: expected value ranges and linear calibration.
//!
//! Built once at startup (defaults, optionally overridden from a JSON file)
//! and passed by reference into the derivation and validation stages.

use std::{collections::BTreeMap, fs, path::Path};

use serde::Deserialize;

use crate::{error::Result, models::ReadingType};

// ---

/// Inclusive `[low, high]` bounds for a reading type.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ExpectedRange {
    pub low: f64,
    pub high: f64,
}

impl ExpectedRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Strictly below `low` or above `high`. NaN is neither.
    pub fn excludes(&self, value: f64) -> bool {
        value < self.low || value > self.high
    }
}

/// `calibrated = raw * multiplier + offset`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Calibration {
    pub multiplier: f64,
    pub offset: f64,
}

impl Calibration {
    pub const IDENTITY: Calibration = Calibration {
        multiplier: 1.0,
        offset: 0.0,
    };

    pub fn apply(&self, value: f64) -> f64 {
        value * self.multiplier + self.offset
    }
}

/// Immutable lookup tables keyed by reading type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReferenceTables {
    // ---
    #[serde(default = "default_ranges")]
    pub expected_ranges: BTreeMap<ReadingType, ExpectedRange>,

    #[serde(default = "default_calibration")]
    pub calibration: BTreeMap<ReadingType, Calibration>,
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self {
            expected_ranges: default_ranges(),
            calibration: default_calibration(),
        }
    }
}

impl ReferenceTables {
    // ---
    /// Load tables from a JSON file. Sections left out of the file keep
    /// their built-in defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        // ---
        let text = fs::read_to_string(path)?;
        let tables = serde_json::from_str(&text)?;
        Ok(tables)
    }

    pub fn range_for(&self, reading_type: &ReadingType) -> Option<ExpectedRange> {
        self.expected_ranges.get(reading_type).copied()
    }

    /// Types without an entry are left as measured.
    pub fn calibration_for(&self, reading_type: &ReadingType) -> Calibration {
        self.calibration
            .get(reading_type)
            .copied()
            .unwrap_or(Calibration::IDENTITY)
    }
}

fn default_ranges() -> BTreeMap<ReadingType, ExpectedRange> {
    // ---
    BTreeMap::from([
        (ReadingType::Temperature, ExpectedRange::new(-20.0, 60.0)),
        (ReadingType::Humidity, ExpectedRange::new(0.0, 100.0)),
        (ReadingType::SoilMoisture, ExpectedRange::new(0.0, 100.0)),
        (ReadingType::Light, ExpectedRange::new(0.0, 200_000.0)),
        (ReadingType::BatteryLevel, ExpectedRange::new(0.0, 100.0)),
    ])
}

fn default_calibration() -> BTreeMap<ReadingType, Calibration> {
    // ---
    [
        ReadingType::Temperature,
        ReadingType::Humidity,
        ReadingType::SoilMoisture,
        ReadingType::Light,
    ]
    .into_iter()
    .map(|kind| (kind, Calibration::IDENTITY))
    .collect()
}
