//! Pipeline reporting collaborator.
//!
//! Stages never log through global state. Each run creates one reporter and
//! hands a reference to every stage; stages announce start/finish and every
//! skip-and-count decision through it. The CLI uses [`TracingReporter`];
//! tests use [`RecordingReporter`] to assert skip counts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// Pipeline stages, in data-flow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Linkage,
    Filter,
    EventWindow,
    Match,
    Shift,
    Select,
    Aggregate,
    AnnualAggregate,
    Summary,
    Regression,
    Export,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Linkage => "linkage",
            Stage::Filter => "filter",
            Stage::EventWindow => "event_window",
            Stage::Match => "match",
            Stage::Shift => "shift",
            Stage::Select => "select",
            Stage::Aggregate => "aggregate",
            Stage::AnnualAggregate => "annual_aggregate",
            Stage::Summary => "summary",
            Stage::Regression => "regression",
            Stage::Export => "export",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why rows, events, firm-years or regression periods were dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Required field null or unparseable.
    MissingData,
    /// Repeated (firm, date) trading observation.
    Duplicate,
    /// No counterpart in the linking table or no trading data for the linked firm.
    Unlinked,
    /// Event lacks a required offset or its window dates are not increasing.
    InconsistentWindow,
    /// No trading day at or after the target, or no future nonzero return.
    UnmatchableDate,
    /// Fewer than four quarters in a firm-year.
    IncompleteFirmYear,
    /// Too few observations (or a singular design) for a regression period.
    InsufficientSample,
    /// Row removed by a sample-definition rule (year span, cutoff, identical dates).
    FilteredOut,
}

impl SkipReason {
    pub fn name(self) -> &'static str {
        match self {
            SkipReason::MissingData => "missing_data",
            SkipReason::Duplicate => "duplicate",
            SkipReason::Unlinked => "unlinked",
            SkipReason::InconsistentWindow => "inconsistent_window",
            SkipReason::UnmatchableDate => "unmatchable_date",
            SkipReason::IncompleteFirmYear => "incomplete_firm_year",
            SkipReason::InsufficientSample => "insufficient_sample",
            SkipReason::FilteredOut => "filtered_out",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback surface for pipeline progress and data-quality accounting.
pub trait PipelineReporter: Send + Sync {
    /// Called when a stage begins.
    fn stage_started(&self, stage: Stage);

    /// Called when a stage completes with the number of rows it produced.
    fn stage_finished(&self, stage: Stage, rows: usize);

    /// Called for every skip decision with the number of affected items.
    fn skipped(&self, stage: Stage, reason: SkipReason, count: usize, detail: &str);

    /// Free-form diagnostic line.
    fn note(&self, stage: Stage, message: &str);
}

/// Reporter that emits structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl PipelineReporter for TracingReporter {
    fn stage_started(&self, stage: Stage) {
        tracing::info!(stage = stage.name(), "stage started");
    }

    fn stage_finished(&self, stage: Stage, rows: usize) {
        tracing::info!(stage = stage.name(), rows, "stage finished");
    }

    fn skipped(&self, stage: Stage, reason: SkipReason, count: usize, detail: &str) {
        if count == 0 {
            tracing::debug!(stage = stage.name(), reason = reason.name(), count, "{detail}");
        } else {
            tracing::warn!(stage = stage.name(), reason = reason.name(), count, "{detail}");
        }
    }

    fn note(&self, stage: Stage, message: &str) {
        tracing::info!(stage = stage.name(), "{message}");
    }
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl PipelineReporter for NullReporter {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _rows: usize) {}
    fn skipped(&self, _stage: Stage, _reason: SkipReason, _count: usize, _detail: &str) {}
    fn note(&self, _stage: Stage, _message: &str) {}
}

/// One recorded reporter call.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    Started(Stage),
    Finished { stage: Stage, rows: usize },
    Skipped { stage: Stage, reason: SkipReason, count: usize, detail: String },
    Note { stage: Stage, message: String },
}

/// Reporter that keeps every call in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.lock().clone()
    }

    /// Total skipped items for a stage and reason.
    pub fn skip_count(&self, stage: Stage, reason: SkipReason) -> usize {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Skipped { stage: s, reason: r, count, .. }
                    if *s == stage && *r == reason =>
                {
                    Some(*count)
                }
                _ => None,
            })
            .sum()
    }

    /// Rows reported by the last `stage_finished` call for a stage.
    pub fn finished_rows(&self, stage: Stage) -> Option<usize> {
        self.lock().iter().rev().find_map(|e| match e {
            ReportEvent::Finished { stage: s, rows } if *s == stage => Some(*rows),
            _ => None,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ReportEvent>> {
        // Recover the events from a poisoned lock.
        self.events.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn push(&self, event: ReportEvent) {
        self.lock().push(event);
    }
}

impl PipelineReporter for RecordingReporter {
    fn stage_started(&self, stage: Stage) {
        self.push(ReportEvent::Started(stage));
    }

    fn stage_finished(&self, stage: Stage, rows: usize) {
        self.push(ReportEvent::Finished { stage, rows });
    }

    fn skipped(&self, stage: Stage, reason: SkipReason, count: usize, detail: &str) {
        self.push(ReportEvent::Skipped {
            stage,
            reason,
            count,
            detail: detail.to_string(),
        });
    }

    fn note(&self, stage: Stage, message: &str) {
        self.push(ReportEvent::Note {
            stage,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_reporter_sums_skips_per_reason() {
        let r = RecordingReporter::new();
        r.skipped(Stage::Aggregate, SkipReason::InconsistentWindow, 2, "missing offset");
        r.skipped(Stage::Aggregate, SkipReason::InconsistentWindow, 3, "dates not increasing");
        r.skipped(Stage::Shift, SkipReason::UnmatchableDate, 1, "no future day");

        assert_eq!(r.skip_count(Stage::Aggregate, SkipReason::InconsistentWindow), 5);
        assert_eq!(r.skip_count(Stage::Shift, SkipReason::UnmatchableDate), 1);
        assert_eq!(r.skip_count(Stage::Select, SkipReason::IncompleteFirmYear), 0);
    }

    #[test]
    fn finished_rows_returns_latest() {
        let r = RecordingReporter::new();
        r.stage_finished(Stage::Match, 10);
        r.stage_finished(Stage::Match, 7);
        assert_eq!(r.finished_rows(Stage::Match), Some(7));
        assert_eq!(r.finished_rows(Stage::Shift), None);
    }

    #[test]
    fn reporters_are_send_sync() {
        fn require<T: Send + Sync>() {}
        require::<TracingReporter>();
        require::<RecordingReporter>();
        require::<NullReporter>();
    }
}
