//! Trading-day matcher.
//!
//! Candidate dates are resolved against a per-firm [`TradingCalendar`]: an
//! ordered `(date, return)` series per `infocode`. Two policies exist and they
//! are not interchangeable:
//!
//! - [`MatchPolicy::NearestFuture`]: earliest trading date `t >= candidate`,
//!   deviation `t - candidate` (never negative). No such date leaves the row
//!   unmatched.
//! - [`MatchPolicy::Exact`]: the trading date equal to the candidate. A miss
//!   drops the row.
//!
//! All lookups are binary searches; "next nonzero return after X" also uses a
//! precomputed forward index so the shifter never rescans a firm's history.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{CandidateRow, InfoCode, MatchedRow, TradingObservation};
use crate::report::{PipelineReporter, SkipReason, Stage};

/// How a candidate date is resolved to a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    #[default]
    NearestFuture,
    Exact,
}

impl MatchPolicy {
    pub fn name(self) -> &'static str {
        match self {
            MatchPolicy::NearestFuture => "nearest_future",
            MatchPolicy::Exact => "exact",
        }
    }
}

/// One firm's trading history, sorted by date with unique dates.
#[derive(Debug, Clone, Default)]
pub struct FirmSeries {
    dates: Vec<NaiveDate>,
    returns: Vec<f64>,
    /// `next_nonzero[i]` is the smallest `j >= i` with `returns[j] != 0`,
    /// or `len` when there is none. Has `len + 1` entries.
    next_nonzero: Vec<usize>,
}

impl FirmSeries {
    fn from_sorted(points: Vec<(NaiveDate, f64)>) -> Self {
        let len = points.len();
        let (dates, returns): (Vec<NaiveDate>, Vec<f64>) = points.into_iter().unzip();
        let mut next_nonzero = vec![len; len + 1];
        for i in (0..len).rev() {
            next_nonzero[i] = if returns[i] != 0.0 { i } else { next_nonzero[i + 1] };
        }
        Self {
            dates,
            returns,
            next_nonzero,
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Earliest trading day on or after `date`.
    pub fn on_or_after(&self, date: NaiveDate) -> Option<(NaiveDate, f64)> {
        let i = self.dates.partition_point(|d| *d < date);
        self.point(i)
    }

    /// Trading day exactly on `date`.
    pub fn exact(&self, date: NaiveDate) -> Option<(NaiveDate, f64)> {
        let i = self.dates.binary_search(&date).ok()?;
        self.point(i)
    }

    /// Earliest trading day strictly after `date` whose return is nonzero.
    pub fn next_nonzero_after(&self, date: NaiveDate) -> Option<(NaiveDate, f64)> {
        let i = self.dates.partition_point(|d| *d <= date);
        self.point(self.next_nonzero[i])
    }

    /// Returns of every trading day in a calendar year, in date order.
    pub fn returns_in_year(&self, year: i32) -> &[f64] {
        let lo = self.dates.partition_point(|d| d.year() < year);
        let hi = self.dates.partition_point(|d| d.year() <= year);
        &self.returns[lo..hi]
    }

    fn point(&self, i: usize) -> Option<(NaiveDate, f64)> {
        Some((*self.dates.get(i)?, self.returns[i]))
    }
}

/// Per-firm index over trading observations.
#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    firms: BTreeMap<InfoCode, FirmSeries>,
}

impl TradingCalendar {
    /// Build the index. Duplicate (firm, date) pairs keep their first occurrence.
    pub fn from_observations(observations: &[TradingObservation]) -> Self {
        let mut grouped: BTreeMap<InfoCode, Vec<(NaiveDate, f64)>> = BTreeMap::new();
        for o in observations {
            grouped.entry(o.infocode).or_default().push((o.date, o.ret));
        }
        let firms = grouped
            .into_iter()
            .map(|(id, mut points)| {
                points.sort_by_key(|p| p.0);
                points.dedup_by_key(|p| p.0);
                (id, FirmSeries::from_sorted(points))
            })
            .collect();
        Self { firms }
    }

    pub fn firm(&self, infocode: InfoCode) -> Option<&FirmSeries> {
        self.firms.get(&infocode)
    }

    pub fn firm_count(&self) -> usize {
        self.firms.len()
    }

    pub fn observation_count(&self) -> usize {
        self.firms.values().map(FirmSeries::len).sum()
    }

    /// Resolve one target date under a policy.
    pub fn resolve(
        &self,
        infocode: InfoCode,
        target: NaiveDate,
        policy: MatchPolicy,
    ) -> Option<(NaiveDate, f64)> {
        let series = self.firm(infocode)?;
        match policy {
            MatchPolicy::NearestFuture => series.on_or_after(target),
            MatchPolicy::Exact => series.exact(target),
        }
    }
}

/// Matched rows plus the counts of candidates that could not be matched.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub rows: Vec<MatchedRow>,
    /// Candidates whose firm has no trading data at all.
    pub without_firm_data: usize,
    /// Candidates with trading data but no acceptable trading day.
    pub unmatched: usize,
}

pub fn match_candidates(
    candidates: &[CandidateRow],
    calendar: &TradingCalendar,
    policy: MatchPolicy,
    reporter: &dyn PipelineReporter,
) -> MatchOutcome {
    reporter.stage_started(Stage::Match);
    let mut outcome = MatchOutcome {
        rows: Vec::with_capacity(candidates.len()),
        ..Default::default()
    };

    for cand in candidates {
        if calendar.firm(cand.event.infocode).is_none() {
            outcome.without_firm_data += 1;
            continue;
        }
        match calendar.resolve(cand.event.infocode, cand.candidate, policy) {
            Some((date, ret)) => outcome.rows.push(MatchedRow {
                event: cand.event,
                offset: cand.offset,
                candidate: cand.candidate,
                date,
                ret,
                deviation_days: (date - cand.candidate).num_days(),
                shifted: false,
            }),
            None => outcome.unmatched += 1,
        }
    }

    reporter.skipped(
        Stage::Match,
        SkipReason::UnmatchableDate,
        outcome.without_firm_data,
        "candidates whose firm has no trading data",
    );
    match policy {
        MatchPolicy::NearestFuture => reporter.skipped(
            Stage::Match,
            SkipReason::UnmatchableDate,
            outcome.unmatched,
            "candidates with no trading day on or after the target",
        ),
        MatchPolicy::Exact => reporter.skipped(
            Stage::Match,
            SkipReason::MissingData,
            outcome.unmatched,
            "candidates falling on a date without a trading observation",
        ),
    }
    reporter.stage_finished(Stage::Match, outcome.rows.len());
    outcome
}

/// Day-0 alignment quality per quarter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviationStats {
    /// Mean calendar-day gap between announcement and matched day 0, Q1..Q4.
    pub mean_day_0_deviation: [Option<f64>; 4],
    pub max_day_0_deviation: Option<i64>,
}

pub fn deviation_stats(rows: &[MatchedRow]) -> DeviationStats {
    let mut sums = [0i64; 4];
    let mut counts = [0usize; 4];
    let mut max = None;
    for row in rows.iter().filter(|r| r.offset == 0) {
        let q = row.event.quarter.index();
        sums[q] += row.deviation_days;
        counts[q] += 1;
        max = max.max(Some(row.deviation_days));
    }
    DeviationStats {
        mean_day_0_deviation: std::array::from_fn(|q| {
            (counts[q] > 0).then(|| sums[q] as f64 / counts[q] as f64)
        }),
        max_day_0_deviation: max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnnouncementEvent, Quarter};
    use crate::report::RecordingReporter;
    use crate::window::WindowSpec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn calendar(points: &[(NaiveDate, f64)]) -> TradingCalendar {
        let obs: Vec<TradingObservation> = points
            .iter()
            .map(|(date, ret)| TradingObservation::new(InfoCode(1), *date, *ret))
            .collect();
        TradingCalendar::from_observations(&obs)
    }

    fn event(rdq: NaiveDate) -> AnnouncementEvent {
        AnnouncementEvent {
            infocode: InfoCode(1),
            fiscal_year: 2019,
            quarter: Quarter::Q1,
            rdq,
        }
    }

    #[test]
    fn nearest_future_picks_earliest_on_or_after() {
        // Fri 2020-03-13, Mon 2020-03-16
        let cal = calendar(&[(d(2020, 3, 16), 0.02), (d(2020, 3, 13), 0.01)]);
        let series = cal.firm(InfoCode(1)).unwrap();
        assert_eq!(series.on_or_after(d(2020, 3, 14)), Some((d(2020, 3, 16), 0.02)));
        assert_eq!(series.on_or_after(d(2020, 3, 13)), Some((d(2020, 3, 13), 0.01)));
        assert_eq!(series.on_or_after(d(2020, 3, 17)), None);
    }

    #[test]
    fn exact_policy_requires_equal_date() {
        let cal = calendar(&[(d(2020, 3, 13), 0.01), (d(2020, 3, 16), 0.02)]);
        assert_eq!(
            cal.resolve(InfoCode(1), d(2020, 3, 14), MatchPolicy::Exact),
            None
        );
        assert_eq!(
            cal.resolve(InfoCode(1), d(2020, 3, 14), MatchPolicy::NearestFuture),
            Some((d(2020, 3, 16), 0.02))
        );
        assert_eq!(cal.resolve(InfoCode(2), d(2020, 3, 14), MatchPolicy::Exact), None);
    }

    #[test]
    fn next_nonzero_skips_zero_runs() {
        let cal = calendar(&[
            (d(2020, 1, 2), 0.0),
            (d(2020, 1, 3), 0.0),
            (d(2020, 1, 6), 0.0),
            (d(2020, 1, 7), 0.04),
        ]);
        let series = cal.firm(InfoCode(1)).unwrap();
        assert_eq!(series.next_nonzero_after(d(2020, 1, 2)), Some((d(2020, 1, 7), 0.04)));
        assert_eq!(series.next_nonzero_after(d(2020, 1, 7)), None);
    }

    #[test]
    fn duplicate_dates_keep_first_observation() {
        let cal = calendar(&[(d(2020, 1, 2), 0.5), (d(2020, 1, 2), 0.9)]);
        assert_eq!(cal.observation_count(), 1);
        assert_eq!(
            cal.resolve(InfoCode(1), d(2020, 1, 2), MatchPolicy::Exact),
            Some((d(2020, 1, 2), 0.5))
        );
    }

    #[test]
    fn returns_in_year_slices_calendar_year() {
        let cal = calendar(&[
            (d(2019, 12, 31), 0.1),
            (d(2020, 1, 2), 0.2),
            (d(2020, 12, 31), 0.3),
            (d(2021, 1, 4), 0.4),
        ]);
        assert_eq!(cal.firm(InfoCode(1)).unwrap().returns_in_year(2020), &[0.2, 0.3]);
        assert!(cal.firm(InfoCode(1)).unwrap().returns_in_year(2018).is_empty());
    }

    #[test]
    fn match_candidates_counts_exact_misses() {
        // rdq on Saturday 2020-03-14: -1 is Friday, 0 and +1 are weekend days.
        let cal = calendar(&[(d(2020, 3, 13), 0.01), (d(2020, 3, 16), 0.02)]);
        let cands = WindowSpec::three_day().candidates(&[event(d(2020, 3, 14))]);

        let reporter = RecordingReporter::new();
        let exact = match_candidates(&cands, &cal, MatchPolicy::Exact, &reporter);
        assert_eq!(exact.rows.len(), 1);
        assert_eq!(exact.unmatched, 2);
        assert_eq!(reporter.skip_count(Stage::Match, SkipReason::MissingData), 2);

        let nearest = match_candidates(&cands, &cal, MatchPolicy::NearestFuture, &reporter);
        assert_eq!(nearest.rows.len(), 3);
        let devs: Vec<i64> = nearest.rows.iter().map(|r| r.deviation_days).collect();
        assert_eq!(devs, vec![0, 2, 1]);
    }

    #[test]
    fn deviation_stats_average_day_zero_only() {
        let cal = calendar(&[(d(2020, 3, 16), 0.02), (d(2020, 3, 20), 0.02)]);
        let cands = WindowSpec::three_day().candidates(&[event(d(2020, 3, 14))]);
        let outcome =
            match_candidates(&cands, &cal, MatchPolicy::NearestFuture, &RecordingReporter::new());
        let stats = deviation_stats(&outcome.rows);
        assert_eq!(stats.mean_day_0_deviation[0], Some(2.0));
        assert_eq!(stats.mean_day_0_deviation[1], None);
        assert_eq!(stats.max_day_0_deviation, Some(2));
    }
}
