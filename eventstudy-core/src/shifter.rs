//! Zero-return shifter.
//!
//! A matched window day whose return is exactly zero is taken to be a stale
//! quote. The row is moved forward to the firm's earliest later trading day
//! with a nonzero return. Rows with a nonzero return are never touched.
//!
//! When no such day exists the row is a [`ShiftFailure`]. Under
//! [`ShiftFailurePolicy::RemoveWindow`] every row of that announcement's
//! window is removed, so no partially repaired window survives.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::{EventKey, MatchedRow};
use crate::matcher::{FirmSeries, TradingCalendar};
use crate::report::{PipelineReporter, SkipReason, Stage};

/// What happens to a window when one of its rows cannot be shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftFailurePolicy {
    /// Remove every row of the (firm, announcement) window.
    #[default]
    RemoveWindow,
    /// Remove only the row that failed.
    DropRow,
}

/// Which offsets are checked for zero returns and how failures are handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftConfig {
    pub offsets: Vec<i32>,
    pub failure_policy: ShiftFailurePolicy,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            offsets: vec![-1, 0, 1],
            failure_policy: ShiftFailurePolicy::RemoveWindow,
        }
    }
}

/// A zero-return row with no later nonzero trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftFailure {
    pub key: EventKey,
    pub offset: i32,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct ShiftOutcome {
    pub rows: Vec<MatchedRow>,
    /// Rows moved to a later trading day.
    pub shifted: usize,
    pub failures: Vec<ShiftFailure>,
    /// Rows removed because of failures (including the failing rows).
    pub removed_rows: usize,
}

/// Repair one row.
///
/// Nonzero rows come back unchanged. A zero row moves to the earliest date
/// strictly after its current date with a nonzero return; zero-return days in
/// between are passed over, so the result never lands on a zero return.
pub fn shift_zero_return(
    row: MatchedRow,
    series: Option<&FirmSeries>,
) -> Result<MatchedRow, ShiftFailure> {
    if row.ret != 0.0 {
        return Ok(row);
    }
    let failure = ShiftFailure {
        key: row.key(),
        offset: row.offset,
        date: row.date,
    };
    let (date, ret) = series
        .and_then(|s| s.next_nonzero_after(row.date))
        .ok_or(failure)?;
    Ok(MatchedRow {
        date,
        ret,
        deviation_days: (date - row.candidate).num_days(),
        shifted: true,
        ..row
    })
}

pub fn shift_zero_returns(
    rows: Vec<MatchedRow>,
    calendar: &TradingCalendar,
    config: &ShiftConfig,
    reporter: &dyn PipelineReporter,
) -> ShiftOutcome {
    reporter.stage_started(Stage::Shift);
    let input = rows.len();
    let mut outcome = ShiftOutcome::default();
    let mut kept = Vec::with_capacity(rows.len());

    for row in rows {
        if !config.offsets.contains(&row.offset) || row.ret != 0.0 {
            kept.push(row);
            continue;
        }
        match shift_zero_return(row, calendar.firm(row.event.infocode)) {
            Ok(moved) => {
                outcome.shifted += 1;
                kept.push(moved);
            }
            Err(failure) => outcome.failures.push(failure),
        }
    }

    if config.failure_policy == ShiftFailurePolicy::RemoveWindow && !outcome.failures.is_empty() {
        let failed: BTreeSet<EventKey> = outcome.failures.iter().map(|f| f.key).collect();
        kept.retain(|r| !failed.contains(&r.key()));
    }
    outcome.removed_rows = input - kept.len();
    outcome.rows = kept;

    reporter.note(
        Stage::Shift,
        &format!("shifted {} zero-return rows to the next nonzero trading day", outcome.shifted),
    );
    reporter.skipped(
        Stage::Shift,
        SkipReason::UnmatchableDate,
        outcome.failures.len(),
        "zero-return rows without a later nonzero trading day",
    );
    if config.failure_policy == ShiftFailurePolicy::RemoveWindow {
        reporter.note(
            Stage::Shift,
            &format!(
                "removed {} rows belonging to windows with a failed shift",
                outcome.removed_rows
            ),
        );
    }
    reporter.stage_finished(Stage::Shift, outcome.rows.len());
    outcome
}
