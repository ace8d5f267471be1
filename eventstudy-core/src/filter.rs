//! Firm-year sample definition.
//!
//! A firm-year survives when all four announcement dates are present, fall in
//! one calendar year, that year is at or before the cutoff, and the four dates
//! are not all identical. Each rule's drops are counted separately.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{FirmYearRecord, TradingObservation};
use crate::report::{PipelineReporter, SkipReason, Stage};

/// Per-rule drop counts from [`filter_valid_earnings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    pub input: usize,
    pub missing_dates: usize,
    pub multi_year: usize,
    pub beyond_cutoff: usize,
    pub identical_dates: usize,
    pub kept: usize,
}

pub fn filter_valid_earnings(
    records: Vec<FirmYearRecord>,
    cutoff_year: i32,
    reporter: &dyn PipelineReporter,
) -> (Vec<FirmYearRecord>, FilterStats) {
    reporter.stage_started(Stage::Filter);
    let mut stats = FilterStats {
        input: records.len(),
        ..Default::default()
    };

    let kept: Vec<FirmYearRecord> = records
        .into_iter()
        .filter(|rec| {
            let Some(dates) = rec.complete_dates() else {
                stats.missing_dates += 1;
                return false;
            };
            let year = dates[0].year();
            if dates.iter().any(|d| d.year() != year) {
                stats.multi_year += 1;
                return false;
            }
            if year > cutoff_year {
                stats.beyond_cutoff += 1;
                return false;
            }
            if dates.iter().all(|d| *d == dates[0]) {
                stats.identical_dates += 1;
                return false;
            }
            true
        })
        .collect();
    stats.kept = kept.len();

    reporter.skipped(
        Stage::Filter,
        SkipReason::MissingData,
        stats.missing_dates,
        "firm-years with a missing announcement date",
    );
    reporter.skipped(
        Stage::Filter,
        SkipReason::FilteredOut,
        stats.multi_year,
        "firm-years whose announcements span multiple calendar years",
    );
    reporter.skipped(
        Stage::Filter,
        SkipReason::FilteredOut,
        stats.beyond_cutoff,
        &format!("firm-years with announcements after {cutoff_year}"),
    );
    reporter.skipped(
        Stage::Filter,
        SkipReason::FilteredOut,
        stats.identical_dates,
        "firm-years whose four announcement dates are identical",
    );
    reporter.stage_finished(Stage::Filter, stats.kept);

    (kept, stats)
}

/// How often trading observations carry an exactly-zero return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroReturnProfile {
    pub observations: usize,
    pub zero_returns: usize,
    /// Up to five (year, count) pairs, most zero returns first.
    pub top_years: Vec<(i32, usize)>,
}

pub fn zero_return_profile(observations: &[TradingObservation]) -> ZeroReturnProfile {
    let mut by_year: BTreeMap<i32, usize> = BTreeMap::new();
    for o in observations.iter().filter(|o| o.is_zero_return()) {
        *by_year.entry(o.date.year()).or_default() += 1;
    }
    let zero_returns = by_year.values().sum();

    let mut top_years: Vec<(i32, usize)> = by_year.into_iter().collect();
    top_years.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    top_years.truncate(5);

    ZeroReturnProfile {
        observations: observations.len(),
        zero_returns,
        top_years,
    }
}
