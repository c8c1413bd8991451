// src/validation/checks.rs
//! The four independent quality checks over an enriched collection.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::report::{GapRow, ProfileRow, QualityReport, QualitySections, RangeCheckRow, TypeCheck};
use crate::{
    models::{EnrichedReading, ReadingType},
    tables::ReferenceTables,
};

const SECONDS_PER_HOUR: i64 = 3600;

// ---

/// Run every check. Empty input short-circuits to [`QualityReport::NoData`].
pub fn build_report(readings: &[EnrichedReading], tables: &ReferenceTables, tz: Tz) -> QualityReport {
    // ---
    if readings.is_empty() {
        tracing::info!("No data to validate");
        return QualityReport::NoData;
    }

    let sections = QualitySections {
        type_check: type_check(readings),
        range_check: range_check(readings, tables),
        gaps: gap_check(readings, tz),
        profile: profile(readings),
    };

    tracing::info!(
        "Quality checks: {} invalid types, {} out-of-range rows, {} missing sensor-hours",
        sections.type_check.invalid_total(),
        sections.range_check.iter().map(|r| r.out_of_range).sum::<u64>(),
        sections.gaps.iter().map(|g| g.missing_hours).sum::<u64>()
    );

    QualityReport::Checked(sections)
}

/// `value` is invalid when infinite (NaN counts as missing, see [`profile`]);
/// `battery_level` when it is non-numeric text or infinite.
pub fn type_check(readings: &[EnrichedReading]) -> TypeCheck {
    // ---
    TypeCheck {
        total_records: readings.len() as u64,
        invalid_value_type: readings.iter().filter(|r| r.value.is_infinite()).count() as u64,
        invalid_battery_level_type: readings
            .iter()
            .filter(|r| r.battery_level.is_invalid())
            .count() as u64,
    }
}

/// Out-of-range counts for the reading types present in the range table.
///
/// Computed from the range table alone, not from `anomalous_reading`.
pub fn range_check(readings: &[EnrichedReading], tables: &ReferenceTables) -> Vec<RangeCheckRow> {
    // ---
    let mut counts: BTreeMap<&ReadingType, (u64, u64)> = BTreeMap::new();
    for r in readings {
        let Some(range) = tables.range_for(&r.reading_type) else {
            continue;
        };
        let entry = counts.entry(&r.reading_type).or_default();
        entry.0 += 1;
        if range.excludes(r.value) {
            entry.1 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(reading_type, (total, out_of_range))| RangeCheckRow {
            reading_type: reading_type.clone(),
            total,
            out_of_range,
        })
        .collect()
}

/// Hourly coverage per sensor across all reading types.
///
/// Hours are wall-clock hours in `tz`, the zone `timestamp_iso` and `date`
/// are rendered in. The grid runs from the hour of the earliest reading to
/// the hour of the latest, both inclusive.
pub fn gap_check(readings: &[EnrichedReading], tz: Tz) -> Vec<GapRow> {
    // ---
    struct Coverage {
        first: DateTime<Utc>,
        last: DateTime<Utc>,
        hours: BTreeSet<i64>,
    }

    let mut per_sensor: BTreeMap<&str, Coverage> = BTreeMap::new();
    for r in readings {
        let hour = local_hour(r.timestamp, tz);
        let cov = per_sensor.entry(&r.sensor_id).or_insert_with(|| Coverage {
            first: r.timestamp,
            last: r.timestamp,
            hours: BTreeSet::new(),
        });
        cov.first = cov.first.min(r.timestamp);
        cov.last = cov.last.max(r.timestamp);
        cov.hours.insert(hour);
    }

    per_sensor
        .into_iter()
        .map(|(sensor_id, cov)| {
            let first_hour = local_hour(cov.first, tz);
            let last_hour = local_hour(cov.last, tz);
            let expected = (last_hour - first_hour + 1) as u64;
            let observed = cov.hours.len() as u64;
            GapRow {
                sensor_id: sensor_id.to_string(),
                first_seen: cov.first,
                last_seen: cov.last,
                expected_hours: expected,
                observed_hours: observed,
                missing_hours: expected - observed,
            }
        })
        .collect()
}

/// Missing-value and anomaly percentages per reading type.
pub fn profile(readings: &[EnrichedReading]) -> Vec<ProfileRow> {
    // ---
    let mut counts: BTreeMap<&ReadingType, (u64, u64, u64)> = BTreeMap::new();
    for r in readings {
        let entry = counts.entry(&r.reading_type).or_default();
        entry.0 += 1;
        if r.value.is_nan() {
            entry.1 += 1;
        }
        if r.anomalous_reading {
            entry.2 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(reading_type, (total, missing, anomalous))| ProfileRow {
            reading_type: reading_type.clone(),
            total,
            pct_missing_value: percent(missing, total),
            pct_anomalous: percent(anomalous, total),
        })
        .collect()
}

/// Index of the wall-clock hour of `ts` in `tz`.
fn local_hour(ts: DateTime<Utc>, tz: Tz) -> i64 {
    ts.with_timezone(&tz)
        .naive_local()
        .and_utc()
        .timestamp()
        .div_euclid(SECONDS_PER_HOUR)
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}
