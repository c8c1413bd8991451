//! Cleaning stage: deduplicate, drop incomplete rows, normalize timestamps
//! and correct statistical outliers per reading type.
//!
//! Rows that fail coercion are dropped silently; only the aggregate count
//! shows up in the logs.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{Numeric, RawReading, Reading, ReadingType};

/// Readings further than this many population standard deviations from
/// their group mean are replaced.
pub const Z_SCORE_LIMIT: f64 = 3.0;

/// Groups smaller than this are never corrected.
pub const MIN_GROUP_SIZE: usize = 3;

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z"];
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

// ---

/// Row that passed the null and timestamp checks but whose value has not
/// been corrected or coerced yet.
struct Staged {
    sensor_id: String,
    timestamp: DateTime<Utc>,
    reading_type: ReadingType,
    value: Numeric,
    battery_level: Numeric,
}

/// Run the full cleaning sequence. Empty input yields empty output.
pub fn clean(raw: Vec<RawReading>) -> Vec<Reading> {
    // ---
    if raw.is_empty() {
        return Vec::new();
    }
    let input_rows = raw.len();

    // Step 1: exact duplicates, first occurrence wins
    let mut seen = HashSet::with_capacity(raw.len());
    let unique: Vec<RawReading> = raw
        .into_iter()
        .filter(|row| seen.insert(row.row_key()))
        .collect();
    let duplicates = input_rows - unique.len();

    // Steps 2 and 3: required fields, then timestamp coercion
    let mut staged: Vec<Staged> = unique.into_iter().filter_map(stage).collect();
    let incomplete = input_rows - duplicates - staged.len();

    // Step 4: z-score correction per reading type
    let corrected = cap_outliers(&mut staged);

    // Step 5: value must be a finite number from here on
    let cleaned: Vec<Reading> = staged
        .into_iter()
        .filter_map(|row| {
            let value = row.value.as_f64().filter(|v| v.is_finite())?;
            Some(Reading {
                sensor_id: row.sensor_id,
                timestamp: row.timestamp,
                reading_type: row.reading_type,
                value,
                battery_level: row.battery_level,
            })
        })
        .collect();

    tracing::debug!(
        "Cleaning dropped {} duplicates, {} incomplete rows, {} non-numeric values; corrected {} outliers",
        duplicates,
        incomplete,
        input_rows - duplicates - incomplete - cleaned.len(),
        corrected
    );
    tracing::info!("Cleaned {} of {} rows", cleaned.len(), input_rows);

    cleaned
}

fn stage(row: RawReading) -> Option<Staged> {
    // ---
    let sensor_id = row.sensor_id.filter(|s| !s.is_empty())?;
    let timestamp = row.timestamp?;
    let reading_type = row.reading_type.filter(|s| !s.is_empty())?;
    if row.value.is_missing() {
        return None;
    }
    let timestamp = parse_timestamp(&timestamp)?;

    Some(Staged {
        sensor_id,
        timestamp,
        reading_type: ReadingType::from(reading_type.as_str()),
        value: row.value,
        battery_level: row.battery_level,
    })
}

/// Coerce a timestamp string into a UTC instant.
///
/// Offset-aware inputs are converted; naive inputs are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    // ---
    let text = text.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(text, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Replace out-of-bound values with the mean of the in-bound values of
/// their reading type. Returns the number of corrected rows.
///
/// One pass per group: the bounds come from the statistics before any
/// value is replaced. If a group has no in-bound values at all it is left
/// as is.
fn cap_outliers(rows: &mut [Staged]) -> usize {
    // ---
    let mut groups: BTreeMap<ReadingType, Vec<usize>> = BTreeMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if row.value.as_f64().is_some_and(f64::is_finite) {
            groups.entry(row.reading_type.clone()).or_default().push(idx);
        }
    }

    let mut corrected = 0;
    for (reading_type, members) in groups {
        let values: Vec<f64> = members
            .iter()
            .filter_map(|&idx| rows[idx].value.as_f64())
            .collect();

        let Some(replacements) = capped_values(&values) else {
            continue;
        };

        for (&idx, (old, new)) in members.iter().zip(values.iter().zip(replacements)) {
            if new != *old {
                rows[idx].value = Numeric::Value(new);
                corrected += 1;
            }
        }
        tracing::trace!("Checked {} {} values for outliers", members.len(), reading_type);
    }
    corrected
}

/// Z-score correction over one group of values.
///
/// Returns `None` when the group is too small, has zero variance, or has
/// no in-bound values to average.
pub fn capped_values(values: &[f64]) -> Option<Vec<f64>> {
    // ---
    if values.len() < MIN_GROUP_SIZE {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    if std == 0.0 {
        return None;
    }

    let within = |v: f64| ((v - mean) / std).abs() <= Z_SCORE_LIMIT;
    let inbound: Vec<f64> = values.iter().copied().filter(|&v| within(v)).collect();
    if inbound.is_empty() {
        return None;
    }
    let inbound_mean = inbound.iter().sum::<f64>() / inbound.len() as f64;

    Some(
        values
            .iter()
            .map(|&v| if within(v) { v } else { inbound_mean })
            .collect(),
    )
}
