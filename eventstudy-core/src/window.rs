//! Event-window builder: melt wide firm-years into announcement events and
//! expand each event into candidate calendar dates.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::{AnnouncementEvent, CandidateRow, FirmYearRecord, Quarter};
use crate::report::{PipelineReporter, SkipReason, Stage};

/// Offsets (in calendar days) around the announcement date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    offsets: Vec<i32>,
}

impl WindowSpec {
    /// Offsets are sorted and de-duplicated.
    pub fn new(mut offsets: Vec<i32>) -> Self {
        offsets.sort_unstable();
        offsets.dedup();
        Self { offsets }
    }

    /// The (-1, 0, +1) window used for the 3-day return.
    pub fn three_day() -> Self {
        Self::new(vec![-1, 0, 1])
    }

    /// The wider (-3..+3) candidate window.
    pub fn seven_day() -> Self {
        Self::new((-3..=3).collect())
    }

    pub fn offsets(&self) -> &[i32] {
        &self.offsets
    }

    pub fn contains(&self, offset: i32) -> bool {
        self.offsets.binary_search(&offset).is_ok()
    }

    /// Expand each event into one candidate row per offset.
    pub fn candidates(&self, events: &[AnnouncementEvent]) -> Vec<CandidateRow> {
        let mut rows = Vec::with_capacity(events.len() * self.offsets.len());
        for event in events {
            for &offset in &self.offsets {
                rows.push(CandidateRow {
                    event: *event,
                    offset,
                    candidate: event.rdq + Duration::days(i64::from(offset)),
                });
            }
        }
        rows
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self::three_day()
    }
}

/// One event per (firm-year, quarter) with a known announcement date.
pub fn melt_announcements(
    records: &[FirmYearRecord],
    reporter: &dyn PipelineReporter,
) -> Vec<AnnouncementEvent> {
    let mut events = Vec::with_capacity(records.len() * 4);
    let mut missing = 0usize;
    for rec in records {
        for quarter in Quarter::ALL {
            match rec.rdq(quarter) {
                Some(rdq) => events.push(AnnouncementEvent {
                    infocode: rec.infocode,
                    fiscal_year: rec.fiscal_year,
                    quarter,
                    rdq,
                }),
                None => missing += 1,
            }
        }
    }
    reporter.skipped(
        Stage::EventWindow,
        SkipReason::MissingData,
        missing,
        "quarters without an announcement date",
    );
    events
}

/// Melt and expand in one step.
pub fn build_event_windows(
    records: &[FirmYearRecord],
    spec: &WindowSpec,
    reporter: &dyn PipelineReporter,
) -> Vec<CandidateRow> {
    reporter.stage_started(Stage::EventWindow);
    let events = melt_announcements(records, reporter);
    let rows = spec.candidates(&events);
    reporter.note(
        Stage::EventWindow,
        &format!(
            "{} events expanded over {} offsets",
            events.len(),
            spec.offsets().len()
        ),
    );
    reporter.stage_finished(Stage::EventWindow, rows.len());
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InfoCode, WsCode};
    use crate::report::RecordingReporter;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn record() -> FirmYearRecord {
        FirmYearRecord {
            code: WsCode(1),
            infocode: InfoCode(7),
            fiscal_year: 2019,
            announcement_dates: [
                Some(d(2020, 2, 20)),
                Some(d(2020, 5, 20)),
                Some(d(2020, 8, 20)),
                Some(d(2020, 11, 20)),
            ],
            reported_annual_return: None,
        }
    }

    #[test]
    fn melt_produces_one_event_per_quarter() {
        let events = melt_announcements(&[record()], &RecordingReporter::new());
        assert_eq!(events.len(), 4);
        assert_eq!(events[2].quarter, Quarter::Q3);
        assert_eq!(events[2].rdq, d(2020, 8, 20));
    }

    #[test]
    fn three_day_window_spans_calendar_days() {
        let rows = build_event_windows(&[record()], &WindowSpec::three_day(), &RecordingReporter::new());
        assert_eq!(rows.len(), 12);
        let first: Vec<(i32, NaiveDate)> = rows[..3].iter().map(|r| (r.offset, r.candidate)).collect();
        assert_eq!(
            first,
            vec![(-1, d(2020, 2, 19)), (0, d(2020, 2, 20)), (1, d(2020, 2, 21))]
        );
    }

    #[test]
    fn window_spec_normalises_offsets() {
        let spec = WindowSpec::new(vec![1, -1, 0, 1]);
        assert_eq!(spec.offsets(), &[-1, 0, 1]);
        assert!(spec.contains(0));
        assert!(!spec.contains(2));
        assert_eq!(WindowSpec::seven_day().offsets().len(), 7);
    }
}
