// src/validation/report.rs
//! Quality report types and their text/CSV rendering.
//!
//! The rendered artifact carries four titled CSV sections in a fixed
//! order: `Type Check:`, `Range Check:`, `Gaps:`, `Profile:`.

use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::Result, models::ReadingType};

pub const NO_DATA_TEXT: &str = "No data available for validation.\n";

// ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeCheck {
    pub total_records: u64,
    pub invalid_value_type: u64,
    pub invalid_battery_level_type: u64,
}

impl TypeCheck {
    pub fn invalid_total(&self) -> u64 {
        self.invalid_value_type + self.invalid_battery_level_type
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeCheckRow {
    pub reading_type: ReadingType,
    pub total: u64,
    pub out_of_range: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapRow {
    pub sensor_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub expected_hours: u64,
    pub observed_hours: u64,
    pub missing_hours: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileRow {
    pub reading_type: ReadingType,
    pub total: u64,
    pub pct_missing_value: f64,
    pub pct_anomalous: f64,
}

/// The four independent sections of a report over non-empty input.
#[derive(Debug, Clone, PartialEq)]
pub struct QualitySections {
    // ---
    pub type_check: TypeCheck,
    pub range_check: Vec<RangeCheckRow>,
    pub gaps: Vec<GapRow>,
    pub profile: Vec<ProfileRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QualityReport {
    NoData,
    Checked(QualitySections),
}

impl QualityReport {
    // ---
    pub fn sections(&self) -> Option<&QualitySections> {
        match self {
            QualityReport::NoData => None,
            QualityReport::Checked(sections) => Some(sections),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, QualityReport::NoData)
    }
}

// ---

/// Render the report as sectioned CSV text.
pub fn render_report(report: &QualityReport) -> Result<String> {
    // ---
    let Some(s) = report.sections() else {
        return Ok(NO_DATA_TEXT.to_string());
    };

    let mut out = String::new();
    write_section(
        &mut out,
        "Type Check",
        &["total_records", "invalid_value_type", "invalid_battery_level_type"],
        std::slice::from_ref(&s.type_check),
    )?;
    out.push('\n');
    write_section(
        &mut out,
        "Range Check",
        &["reading_type", "total", "out_of_range"],
        &s.range_check,
    )?;
    out.push('\n');
    write_section(
        &mut out,
        "Gaps",
        &[
            "sensor_id",
            "first_seen",
            "last_seen",
            "expected_hours",
            "observed_hours",
            "missing_hours",
        ],
        &s.gaps,
    )?;
    out.push('\n');
    write_section(
        &mut out,
        "Profile",
        &["reading_type", "total", "pct_missing_value", "pct_anomalous"],
        &s.profile,
    )?;

    Ok(out)
}

/// Render and write the report, creating parent directories.
pub fn write_report(report: &QualityReport, path: &Path) -> Result<()> {
    // ---
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_report(report)?)?;
    tracing::info!("Data quality report saved to {}", path.display());
    Ok(())
}

/// Headers are written explicitly so empty sections still carry them.
fn write_section<T: Serialize>(
    out: &mut String,
    title: &str,
    columns: &[&str],
    rows: &[T],
) -> Result<()> {
    // ---
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(columns)?;
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    out.push_str(title);
    out.push_str(":\n");
    out.push_str(&String::from_utf8_lossy(&bytes));
    Ok(())
}
