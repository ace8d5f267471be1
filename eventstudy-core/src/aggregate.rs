//! Buy-and-hold return aggregation.
//!
//! Event BHR compounds the returns at offsets -1, 0 and +1 of one
//! announcement. Annual BHR compounds every daily return of a firm in a
//! calendar year. Events with a missing offset, or whose matched dates are not
//! strictly increasing, are skipped rather than imputed.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{AnnualBhr, EventBhr, EventKey, MatchedRow};
use crate::matcher::TradingCalendar;
use crate::report::{PipelineReporter, SkipReason, Stage};
use crate::selector::FirmYear;

/// Offsets compounded into the event return, in window order.
pub const BHR_OFFSETS: [i32; 3] = [-1, 0, 1];

/// `prod(1 + r) - 1`. An empty slice compounds to zero.
pub fn compound(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

pub fn bhr_3day(r_minus_1: f64, r_0: f64, r_plus_1: f64) -> f64 {
    compound(&[r_minus_1, r_0, r_plus_1])
}

#[derive(Debug, Clone, Default)]
pub struct EventBhrOutcome {
    pub results: Vec<EventBhr>,
    pub skipped_missing_offset: usize,
    pub skipped_non_increasing: usize,
    /// Events removed afterwards because their firm-year lost a quarter.
    pub skipped_incomplete_firm_year: usize,
}

impl EventBhrOutcome {
    pub fn skipped(&self) -> usize {
        self.skipped_missing_offset + self.skipped_non_increasing + self.skipped_incomplete_firm_year
    }
}

pub fn aggregate_event_bhr(rows: &[MatchedRow], reporter: &dyn PipelineReporter) -> EventBhrOutcome {
    reporter.stage_started(Stage::Aggregate);

    let mut windows: BTreeMap<EventKey, BTreeMap<i32, &MatchedRow>> = BTreeMap::new();
    for row in rows {
        windows
            .entry(row.key())
            .or_default()
            .entry(row.offset)
            .or_insert(row);
    }

    let mut outcome = EventBhrOutcome::default();
    for (key, by_offset) in &windows {
        let Some(window) = BHR_OFFSETS
            .iter()
            .map(|o| by_offset.get(o).copied())
            .collect::<Option<Vec<&MatchedRow>>>()
        else {
            outcome.skipped_missing_offset += 1;
            continue;
        };
        if !window.windows(2).all(|pair| pair[0].date < pair[1].date) {
            outcome.skipped_non_increasing += 1;
            continue;
        }
        outcome.results.push(EventBhr {
            infocode: key.infocode,
            fiscal_year: key.fiscal_year,
            year: window[1].event.year(),
            quarter: key.quarter,
            rdq: key.rdq,
            day_0: window[1].date,
            bhr_3day: bhr_3day(window[0].ret, window[1].ret, window[2].ret),
        });
    }

    reporter.skipped(
        Stage::Aggregate,
        SkipReason::InconsistentWindow,
        outcome.skipped_missing_offset,
        "events missing a window offset",
    );
    reporter.skipped(
        Stage::Aggregate,
        SkipReason::InconsistentWindow,
        outcome.skipped_non_increasing,
        "events whose window dates are not strictly increasing",
    );
    reporter.stage_finished(Stage::Aggregate, outcome.results.len());
    outcome
}

#[derive(Debug, Clone, Default)]
pub struct AnnualBhrOutcome {
    pub results: Vec<AnnualBhr>,
    pub skipped_no_data: usize,
}

pub fn annual_bhr(
    firm_years: &BTreeSet<FirmYear>,
    calendar: &TradingCalendar,
    reporter: &dyn PipelineReporter,
) -> AnnualBhrOutcome {
    reporter.stage_started(Stage::AnnualAggregate);
    let mut outcome = AnnualBhrOutcome::default();

    for &(infocode, year) in firm_years {
        let returns = calendar
            .firm(infocode)
            .map(|s| s.returns_in_year(year))
            .unwrap_or_default();
        if returns.is_empty() {
            outcome.skipped_no_data += 1;
            continue;
        }
        outcome.results.push(AnnualBhr {
            infocode,
            year,
            bhr_annual: compound(returns),
            trading_days: returns.len(),
        });
    }

    reporter.skipped(
        Stage::AnnualAggregate,
        SkipReason::MissingData,
        outcome.skipped_no_data,
        "firm-years without daily returns in the calendar year",
    );
    reporter.stage_finished(Stage::AnnualAggregate, outcome.results.len());
    outcome
}
