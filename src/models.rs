//! Data models for the sensor quality pipeline.
//!
//! A reading moves through three shapes:
//! - [`RawReading`]: straight off a batch, every field nullable
//! - [`Reading`]: after cleaning, identity fields and `value` guaranteed
//! - [`EnrichedReading`]: after feature derivation, ready for the sinks

use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---

/// Kind of measurement carried by a reading.
///
/// The well-known kinds get their own variant; anything else is kept
/// verbatim in [`ReadingType::Other`] so new sensor kinds flow through
/// without a code change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReadingType {
    // ---
    Temperature,
    Humidity,
    SoilMoisture,
    Light,
    BatteryLevel,
    Other(String),
}

impl ReadingType {
    // ---
    pub fn as_str(&self) -> &str {
        // ---
        match self {
            ReadingType::Temperature => "temperature",
            ReadingType::Humidity => "humidity",
            ReadingType::SoilMoisture => "soil_moisture",
            ReadingType::Light => "light",
            ReadingType::BatteryLevel => "battery_level",
            ReadingType::Other(name) => name,
        }
    }
}

impl From<&str> for ReadingType {
    fn from(s: &str) -> Self {
        // ---
        match s {
            "temperature" => ReadingType::Temperature,
            "humidity" => ReadingType::Humidity,
            "soil_moisture" => ReadingType::SoilMoisture,
            "light" => ReadingType::Light,
            "battery_level" => ReadingType::BatteryLevel,
            other => ReadingType::Other(other.to_string()),
        }
    }
}

impl FromStr for ReadingType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ReadingType::from(s))
    }
}

impl fmt::Display for ReadingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Ordered by name so grouped output is stable regardless of variant order.
impl Ord for ReadingType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for ReadingType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for ReadingType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReadingType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ReadingType::from(name.as_str()))
    }
}

// ---

/// A numeric cell as it arrived from a batch.
///
/// Text that does not parse is kept in [`Numeric::Invalid`] instead of
/// being nulled out, so the validator can still count contamination.
#[derive(Debug, Clone, PartialEq)]
pub enum Numeric {
    // ---
    Value(f64),
    Missing,
    Invalid(String),
}

impl Numeric {
    // ---
    /// Parse a raw cell. Blank, `null`, `none` and `NaN` cells are missing.
    pub fn parse(raw: Option<&str>) -> Self {
        // ---
        let Some(text) = raw.map(str::trim) else {
            return Numeric::Missing;
        };

        if text.is_empty()
            || text.eq_ignore_ascii_case("null")
            || text.eq_ignore_ascii_case("none")
        {
            return Numeric::Missing;
        }

        match text.parse::<f64>() {
            Ok(v) if v.is_nan() => Numeric::Missing,
            Ok(v) => Numeric::Value(v),
            Err(_) => Numeric::Invalid(text.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Numeric::Missing)
    }

    /// True for anything that is present but not a usable finite number.
    pub fn is_invalid(&self) -> bool {
        // ---
        match self {
            Numeric::Value(v) => !v.is_finite(),
            Numeric::Missing => false,
            Numeric::Invalid(_) => true,
        }
    }

    fn key(&self) -> NumericKey {
        // ---
        match self {
            Numeric::Value(v) => NumericKey::Value(v.to_bits()),
            Numeric::Missing => NumericKey::Missing,
            Numeric::Invalid(text) => NumericKey::Invalid(text.clone()),
        }
    }
}

impl Serialize for Numeric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // ---
        match self {
            Numeric::Value(v) => serializer.serialize_f64(*v),
            Numeric::Missing => serializer.serialize_none(),
            Numeric::Invalid(text) => serializer.serialize_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NumericKey {
    Value(u64),
    Missing,
    Invalid(String),
}

// ---

/// Reading exactly as loaded from a raw batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    // ---
    pub sensor_id: Option<String>,
    pub timestamp: Option<String>,
    pub reading_type: Option<String>,
    pub value: Numeric,
    pub battery_level: Numeric,
}

/// Hashable full-row identity used for duplicate removal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    sensor_id: Option<String>,
    timestamp: Option<String>,
    reading_type: Option<String>,
    value: NumericKey,
    battery_level: NumericKey,
}

impl RawReading {
    // ---
    pub fn row_key(&self) -> RowKey {
        // ---
        RowKey {
            sensor_id: self.sensor_id.clone(),
            timestamp: self.timestamp.clone(),
            reading_type: self.reading_type.clone(),
            value: self.value.key(),
            battery_level: self.battery_level.key(),
        }
    }
}

/// Cleaned readings render back into raw form with an RFC 3339 timestamp,
/// which is what lets cleaning be re-applied to its own output.
impl From<&Reading> for RawReading {
    fn from(reading: &Reading) -> Self {
        // ---
        RawReading {
            sensor_id: Some(reading.sensor_id.clone()),
            timestamp: Some(
                reading
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
            reading_type: Some(reading.reading_type.to_string()),
            value: Numeric::Value(reading.value),
            battery_level: reading.battery_level.clone(),
        }
    }
}

/// Reading that survived the cleaning stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    // ---
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub reading_type: ReadingType,
    pub value: f64,
    pub battery_level: Numeric,
}

/// Reading with derived features, in the column order written by the sinks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedReading {
    // ---
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub timestamp_iso: String,
    pub date: NaiveDate,
    pub reading_type: ReadingType,
    pub value: f64,
    pub battery_level: Numeric,
    pub calibrated_value: f64,
    pub daily_avg_value: f64,
    pub rolling_7d_avg: f64,
    pub anomalous_reading: bool,
}
