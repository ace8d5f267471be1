//! Criterion benchmarks for the matching hot path.
//!
//! 1. Calendar construction from raw observations
//! 2. Nearest-future and exact matching of a full candidate set
//! 3. Zero-return shifting of matched rows

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use eventstudy_core::domain::{FirmYearRecord, InfoCode, TradingObservation, WsCode};
use eventstudy_core::matcher::{match_candidates, MatchPolicy, TradingCalendar};
use eventstudy_core::report::NullReporter;
use eventstudy_core::shifter::{shift_zero_returns, ShiftConfig};
use eventstudy_core::window::{build_event_windows, WindowSpec};

// ── Helpers ──────────────────────────────────────────────────────────

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()
}

/// Calendar days with every seventh return zero.
fn make_observations(firms: i64, days: i64) -> Vec<TradingObservation> {
    (0..firms)
        .flat_map(|f| {
            (0..days).map(move |i| {
                let ret = if i % 7 == 3 { 0.0 } else { ((i + f) as f64 * 0.37).sin() * 0.01 };
                TradingObservation::new(InfoCode(f), base() + Duration::days(i), ret)
            })
        })
        .collect()
}

fn make_records(firms: i64, years: i32) -> Vec<FirmYearRecord> {
    (0..firms)
        .flat_map(|f| {
            (0..years).map(move |y| {
                let year = 2015 + y;
                FirmYearRecord {
                    code: WsCode(f),
                    infocode: InfoCode(f),
                    fiscal_year: year - 1,
                    announcement_dates: [2, 5, 8, 11]
                        .map(|m| NaiveDate::from_ymd_opt(year, m, 10 + (f % 15) as u32)),
                    reported_annual_return: None,
                }
            })
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_calendar(c: &mut Criterion) {
    let mut group = c.benchmark_group("calendar");
    for firms in [10i64, 100] {
        let obs = make_observations(firms, 5 * 365);
        group.bench_with_input(BenchmarkId::new("from_observations", firms), &obs, |b, obs| {
            b.iter(|| TradingCalendar::from_observations(black_box(obs)))
        });
    }
    group.finish();
}

fn bench_matching(c: &mut Criterion) {
    let obs = make_observations(100, 5 * 365);
    let calendar = TradingCalendar::from_observations(&obs);
    let records = make_records(100, 4);
    let candidates = build_event_windows(&records, &WindowSpec::seven_day(), &NullReporter);

    let mut group = c.benchmark_group("match");
    for policy in [MatchPolicy::NearestFuture, MatchPolicy::Exact] {
        group.bench_function(policy.name(), |b| {
            b.iter(|| match_candidates(black_box(&candidates), &calendar, policy, &NullReporter))
        });
    }
    group.finish();
}

fn bench_shift(c: &mut Criterion) {
    let obs = make_observations(100, 5 * 365);
    let calendar = TradingCalendar::from_observations(&obs);
    let records = make_records(100, 4);
    let candidates = build_event_windows(&records, &WindowSpec::three_day(), &NullReporter);
    let matched = match_candidates(&candidates, &calendar, MatchPolicy::NearestFuture, &NullReporter);
    let config = ShiftConfig::default();

    c.bench_function("shift_zero_returns_1200_windows", |b| {
        b.iter(|| {
            shift_zero_returns(
                black_box(matched.rows.clone()),
                &calendar,
                &config,
                &NullReporter,
            )
        })
    });
}

criterion_group!(benches, bench_calendar, bench_matching, bench_shift);
criterion_main!(benches);
