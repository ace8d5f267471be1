//! Sample selector: complete firm-years only.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{EventBhr, InfoCode, MatchedRow, Quarter};
use crate::report::{PipelineReporter, SkipReason, Stage};

/// A firm in a calendar (announcement) year.
pub type FirmYear = (InfoCode, i32);

#[derive(Debug, Clone, Default)]
pub struct SelectOutcome {
    pub rows: Vec<MatchedRow>,
    pub kept_firm_years: BTreeSet<FirmYear>,
    pub dropped_firm_years: usize,
}

/// Keep a firm-year only when its offset-0 rows cover all four quarters.
///
/// Incomplete firm-years lose every row, not only their day-0 rows.
pub fn select_complete_firm_years(
    rows: Vec<MatchedRow>,
    reporter: &dyn PipelineReporter,
) -> SelectOutcome {
    reporter.stage_started(Stage::Select);

    let mut quarters: BTreeMap<FirmYear, BTreeSet<Quarter>> = BTreeMap::new();
    for row in &rows {
        let entry = quarters.entry((row.event.infocode, row.event.year())).or_default();
        if row.offset == 0 {
            entry.insert(row.event.quarter);
        }
    }

    let kept_firm_years: BTreeSet<FirmYear> = quarters
        .iter()
        .filter(|(_, qs)| qs.len() == Quarter::ALL.len())
        .map(|(fy, _)| *fy)
        .collect();
    let dropped_firm_years = quarters.len() - kept_firm_years.len();

    let rows: Vec<MatchedRow> = rows
        .into_iter()
        .filter(|r| kept_firm_years.contains(&(r.event.infocode, r.event.year())))
        .collect();

    reporter.skipped(
        Stage::Select,
        SkipReason::IncompleteFirmYear,
        dropped_firm_years,
        "firm-years without all four quarterly announcements",
    );
    reporter.stage_finished(Stage::Select, rows.len());

    SelectOutcome {
        rows,
        kept_firm_years,
        dropped_firm_years,
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompleteEvents {
    pub results: Vec<EventBhr>,
    pub firm_years: BTreeSet<FirmYear>,
    pub dropped_firm_years: usize,
    pub dropped_events: usize,
}

/// Re-apply the four-quarter rule to aggregated event returns.
///
/// Aggregation can still skip a window (missing offset, colliding dates), so
/// a firm-year that passed [`select_complete_firm_years`] may come out with
/// fewer than four event returns. Such firm-years lose their remaining events,
/// and the returned `firm_years` is the set annual returns are computed for.
pub fn select_complete_event_years(
    results: Vec<EventBhr>,
    reporter: &dyn PipelineReporter,
) -> CompleteEvents {
    let mut quarters: BTreeMap<FirmYear, BTreeSet<Quarter>> = BTreeMap::new();
    for bhr in &results {
        quarters.entry((bhr.infocode, bhr.year)).or_default().insert(bhr.quarter);
    }

    let firm_years: BTreeSet<FirmYear> = quarters
        .iter()
        .filter(|(_, qs)| qs.len() == Quarter::ALL.len())
        .map(|(fy, _)| *fy)
        .collect();
    let dropped_firm_years = quarters.len() - firm_years.len();

    let total = results.len();
    let results: Vec<EventBhr> = results
        .into_iter()
        .filter(|e| firm_years.contains(&(e.infocode, e.year)))
        .collect();
    let dropped_events = total - results.len();

    reporter.skipped(
        Stage::Select,
        SkipReason::IncompleteFirmYear,
        dropped_firm_years,
        "firm-years left with fewer than four event returns after aggregation",
    );

    CompleteEvents {
        results,
        firm_years,
        dropped_firm_years,
        dropped_events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnnouncementEvent;
    use crate::report::RecordingReporter;
    use chrono::NaiveDate;

    fn row(infocode: i64, quarter: Quarter, month: u32, offset: i32) -> MatchedRow {
        let rdq = NaiveDate::from_ymd_opt(2021, month, 15).unwrap();
        let date = rdq + chrono::Duration::days(offset as i64);
        MatchedRow {
            event: AnnouncementEvent {
                infocode: InfoCode(infocode),
                fiscal_year: 2020,
                quarter,
                rdq,
            },
            offset,
            candidate: date,
            date,
            ret: 0.01,
            deviation_days: 0,
            shifted: false,
        }
    }

    fn full_year(infocode: i64) -> Vec<MatchedRow> {
        Quarter::ALL
            .iter()
            .zip([2, 5, 8, 11])
            .flat_map(|(q, m)| (-1..=1).map(move |o| row(infocode, *q, m, o)))
            .collect()
    }

    #[test]
    fn complete_firm_year_is_kept() {
        let out = select_complete_firm_years(full_year(1), &RecordingReporter::new());
        assert_eq!(out.rows.len(), 12);
        assert!(out.kept_firm_years.contains(&(InfoCode(1), 2021)));
        assert_eq!(out.dropped_firm_years, 0);
    }

    #[test]
    fn missing_day_0_drops_whole_firm_year() {
        let mut rows = full_year(1);
        rows.retain(|r| !(r.event.quarter == Quarter::Q3 && r.offset == 0));
        rows.extend(full_year(2));

        let reporter = RecordingReporter::new();
        let out = select_complete_firm_years(rows, &reporter);
        assert!(out.rows.iter().all(|r| r.event.infocode == InfoCode(2)));
        assert_eq!(out.rows.len(), 12);
        assert_eq!(out.dropped_firm_years, 1);
        assert_eq!(reporter.skip_count(Stage::Select, SkipReason::IncompleteFirmYear), 1);
    }

    #[test]
    fn duplicate_quarter_does_not_count_twice() {
        let rows = vec![
            row(1, Quarter::Q1, 2, 0),
            row(1, Quarter::Q1, 3, 0),
            row(1, Quarter::Q2, 5, 0),
            row(1, Quarter::Q3, 8, 0),
        ];
        let out = select_complete_firm_years(rows, &RecordingReporter::new());
        assert!(out.rows.is_empty());
    }
    fn event_bhr(infocode: i64, quarter: Quarter, year: i32) -> EventBhr {
        let rdq = NaiveDate::from_ymd_opt(year, 3 * quarter.index() as u32 + 2, 15).unwrap();
        EventBhr {
            infocode: InfoCode(infocode),
            fiscal_year: year - 1,
            year,
            quarter,
            rdq,
            day_0: rdq,
            bhr_3day: 0.01,
        }
    }

    #[test]
    fn event_years_missing_a_quarter_are_dropped() {
        let mut results: Vec<EventBhr> =
            Quarter::ALL.iter().map(|q| event_bhr(1, *q, 2021)).collect();
        results.extend(
            Quarter::ALL
                .iter()
                .filter(|q| **q != Quarter::Q2)
                .map(|q| event_bhr(2, *q, 2021)),
        );

        let reporter = RecordingReporter::new();
        let out = select_complete_event_years(results, &reporter);
        assert_eq!(out.firm_years, BTreeSet::from([(InfoCode(1), 2021)]));
        assert_eq!(out.results.len(), 4);
        assert!(out.results.iter().all(|e| e.infocode == InfoCode(1)));
        assert_eq!(out.dropped_firm_years, 1);
        assert_eq!(out.dropped_events, 3);
        assert_eq!(reporter.skip_count(Stage::Select, SkipReason::IncompleteFirmYear), 1);
    }

    #[test]
    fn event_years_are_keyed_by_announcement_year() {
        let mut results: Vec<EventBhr> =
            Quarter::ALL.iter().map(|q| event_bhr(1, *q, 2021)).collect();
        results.push(event_bhr(1, Quarter::Q1, 2022));
        let out = select_complete_event_years(results, &RecordingReporter::new());
        assert_eq!(out.firm_years, BTreeSet::from([(InfoCode(1), 2021)]));
        assert_eq!(out.dropped_events, 1);
    }
}
