//! Feature derivation: zoned timestamps, daily and rolling averages,
//! anomaly flags and calibration.
//!
//! Aggregates are computed per key and joined back by key, never by row
//! position, so the output order is free to differ from the input.

use std::collections::{BTreeMap, VecDeque};

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::{
    models::{EnrichedReading, Reading, ReadingType},
    tables::ReferenceTables,
};

/// Trailing window of daily averages behind `rolling_7d_avg`.
pub const ROLLING_WINDOW_DAYS: usize = 7;

/// Rendering of `timestamp_iso` in the target zone.
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

type DayKey = (String, ReadingType, NaiveDate);

// ---

/// True when `value` falls outside the expected range of its type.
/// Types without a range are never anomalous.
pub fn is_anomalous(reading_type: &ReadingType, value: f64, tables: &ReferenceTables) -> bool {
    tables
        .range_for(reading_type)
        .is_some_and(|range| range.excludes(value))
}

pub fn calibrate(reading_type: &ReadingType, value: f64, tables: &ReferenceTables) -> f64 {
    tables.calibration_for(reading_type).apply(value)
}

/// Enrich cleaned readings. Output is sorted by sensor, reading type,
/// date and timestamp.
pub fn derive_features(readings: Vec<Reading>, tables: &ReferenceTables, tz: Tz) -> Vec<EnrichedReading> {
    // ---
    if readings.is_empty() {
        return Vec::new();
    }

    // Steps 1 and 2: zone conversion and calendar date
    let zoned: Vec<(Reading, String, NaiveDate)> = readings
        .into_iter()
        .map(|r| {
            let local = r.timestamp.with_timezone(&tz);
            let iso = local.format(ISO_FORMAT).to_string();
            let date = local.date_naive();
            (r, iso, date)
        })
        .collect();

    // Step 3: daily averages
    let mut sums: BTreeMap<DayKey, (f64, usize)> = BTreeMap::new();
    for (r, _, date) in &zoned {
        let entry = sums
            .entry((r.sensor_id.clone(), r.reading_type.clone(), *date))
            .or_insert((0.0, 0));
        entry.0 += r.value;
        entry.1 += 1;
    }
    let daily: BTreeMap<DayKey, f64> = sums
        .into_iter()
        .map(|(key, (sum, count))| (key, sum / count as f64))
        .collect();

    // Step 4: rolling mean over the daily sequence of each series
    let rolling = rolling_daily_means(&daily);

    tracing::debug!(
        "Derived {} daily averages across {} readings",
        daily.len(),
        zoned.len()
    );

    // Steps 5 and 6: per-row flags and calibration
    let mut enriched: Vec<EnrichedReading> = zoned
        .into_iter()
        .map(|(r, timestamp_iso, date)| {
            let key = (r.sensor_id.clone(), r.reading_type.clone(), date);
            EnrichedReading {
                anomalous_reading: is_anomalous(&r.reading_type, r.value, tables),
                calibrated_value: calibrate(&r.reading_type, r.value, tables),
                daily_avg_value: daily[&key],
                rolling_7d_avg: rolling[&key],
                sensor_id: r.sensor_id,
                timestamp: r.timestamp,
                timestamp_iso,
                date,
                reading_type: r.reading_type,
                value: r.value,
                battery_level: r.battery_level,
            }
        })
        .collect();

    enriched.sort_by(|a, b| {
        (&a.sensor_id, &a.reading_type, a.date, a.timestamp).cmp(&(
            &b.sensor_id,
            &b.reading_type,
            b.date,
            b.timestamp,
        ))
    });
    enriched
}

/// Trailing mean of up to [`ROLLING_WINDOW_DAYS`] daily averages, minimum
/// window of one. `daily` is walked in key order, so each series arrives
/// contiguous and sorted by date.
fn rolling_daily_means(daily: &BTreeMap<DayKey, f64>) -> BTreeMap<DayKey, f64> {
    // ---
    let mut rolling = BTreeMap::new();
    let mut series: Option<(&str, &ReadingType)> = None;
    let mut window: VecDeque<f64> = VecDeque::with_capacity(ROLLING_WINDOW_DAYS);

    for (key, &avg) in daily {
        let (sensor_id, reading_type, _) = key;
        if series != Some((sensor_id.as_str(), reading_type)) {
            series = Some((sensor_id.as_str(), reading_type));
            window.clear();
        }

        if window.len() == ROLLING_WINDOW_DAYS {
            window.pop_front();
        }
        window.push_back(avg);

        let mean = window.iter().sum::<f64>() / window.len() as f64;
        rolling.insert(key.clone(), mean);
    }
    rolling
}
