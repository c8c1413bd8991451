//! Quality validator gateway.
//!
//! Building the report never fails; whether a report should stop the run
//! is decided separately by [`enforce`], so callers can persist the report
//! before acting on a hard failure.

mod checks;
mod report;

pub use checks::{build_report, gap_check, profile, range_check, type_check};
pub use report::{
    render_report, write_report, GapRow, ProfileRow, QualityReport, QualitySections,
    RangeCheckRow, TypeCheck, NO_DATA_TEXT,
};

use crate::error::QualityFailure;

// ---

/// Thresholds for the opt-in hard failure mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailFastPolicy {
    pub enabled: bool,

    /// Largest tolerated count of rows with a non-numeric value or battery level.
    pub max_invalid_types: u64,

    /// Largest tolerated missing-value percentage for any reading type.
    pub max_pct_missing: f64,
}

impl Default for FailFastPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_invalid_types: 0,
            max_pct_missing: 10.0,
        }
    }
}

impl FailFastPolicy {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

/// Turn threshold violations into a [`QualityFailure`] when fail-fast is on.
///
/// A disabled policy and a "no data" report always pass.
pub fn enforce(report: &QualityReport, policy: &FailFastPolicy) -> Result<(), QualityFailure> {
    // ---
    if !policy.enabled {
        return Ok(());
    }
    let Some(sections) = report.sections() else {
        return Ok(());
    };

    let invalid = sections.type_check.invalid_total();
    if invalid > policy.max_invalid_types {
        return Err(QualityFailure::InvalidTypes {
            count: invalid,
            threshold: policy.max_invalid_types,
        });
    }

    if let Some(row) = sections
        .profile
        .iter()
        .find(|row| row.pct_missing_value > policy.max_pct_missing)
    {
        return Err(QualityFailure::MissingValues {
            reading_type: row.reading_type.clone(),
            pct: row.pct_missing_value,
            threshold: policy.max_pct_missing,
        });
    }

    Ok(())
}
