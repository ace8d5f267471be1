//! Per-year cross-sectional regressions of annual BHR on the four quarterly
//! announcement-window BHRs:
//!
//! `annual = b0 + b1 q1 + b2 q2 + b3 q3 + b4 q4 + e`
//!
//! Fitted by least squares on the SVD of the design matrix. A period is
//! skipped when it has no more observations than coefficients or when the
//! design is rank deficient.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use eventstudy_core::domain::{AnnualBhr, EventBhr, InfoCode};
use eventstudy_core::report::{PipelineReporter, SkipReason, Stage};

/// Intercept plus four quarterly slopes.
pub const REGRESSORS: usize = 5;

pub const POOLED_PERIOD: &str = "all";

/// One firm-year with its annual and quarterly returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionObs {
    pub infocode: InfoCode,
    pub year: i32,
    pub annual: f64,
    pub quarters: [f64; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionRow {
    pub period: String,
    pub intercept: f64,
    pub slopes: [f64; 4],
    pub r2: f64,
    pub adj_r2: f64,
    pub abnormal_r2: f64,
    pub n_obs: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    pub coefficients: Vec<f64>,
    pub r2: f64,
    pub adj_r2: f64,
    pub n_obs: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RegressionOutcome {
    pub rows: Vec<RegressionRow>,
    pub skipped_small: Vec<String>,
    pub skipped_singular: Vec<String>,
}

/// Join annual BHR with the firm's four event BHRs of the same year.
///
/// Returns the sample and the number of firm-years lacking a quarter.
pub fn build_regression_sample(
    annual: &[AnnualBhr],
    events: &[EventBhr],
) -> (Vec<RegressionObs>, usize) {
    let mut quarters: BTreeMap<(InfoCode, i32), [Option<f64>; 4]> = BTreeMap::new();
    for e in events {
        let slot = &mut quarters.entry((e.infocode, e.year)).or_default()[e.quarter.index()];
        if slot.is_none() {
            *slot = Some(e.bhr_3day);
        }
    }

    let mut incomplete = 0usize;
    let mut sample = Vec::with_capacity(annual.len());
    for a in annual {
        let Some([q1, q2, q3, q4]) = quarters.get(&(a.infocode, a.year)).copied() else {
            incomplete += 1;
            continue;
        };
        match (q1, q2, q3, q4) {
            (Some(q1), Some(q2), Some(q3), Some(q4)) => sample.push(RegressionObs {
                infocode: a.infocode,
                year: a.year,
                annual: a.bhr_annual,
                quarters: [q1, q2, q3, q4],
            }),
            _ => incomplete += 1,
        }
    }
    (sample, incomplete)
}

/// OLS with an intercept, solved through the SVD of the design matrix.
/// `None` when `n <= k`, the design is rank deficient, or `y` is constant.
pub fn ols(y: &[f64], x: &[Vec<f64>]) -> Option<OlsFit> {
    let n = y.len();
    let k = x.first()?.len() + 1;
    if n <= k || x.len() != n || x.iter().any(|row| row.len() + 1 != k) {
        return None;
    }

    let design = DMatrix::from_fn(n, k, |i, j| if j == 0 { 1.0 } else { x[i][j - 1] });
    let target = DVector::from_column_slice(y);
    let svd = design.clone().svd(true, true);
    let eps = f64::EPSILON * n as f64 * svd.singular_values.max();
    if svd.rank(eps) < k {
        return None;
    }
    let beta = svd.solve(&target, eps).ok()?;

    let residuals = &target - &design * &beta;
    let ssr = residuals.norm_squared();
    let sst = target.add_scalar(-target.mean()).norm_squared();
    if sst <= 0.0 {
        return None;
    }
    let r2 = 1.0 - ssr / sst;
    let adj_r2 = 1.0 - (1.0 - r2) * (n as f64 - 1.0) / (n - k) as f64;
    Some(OlsFit {
        coefficients: beta.iter().copied().collect(),
        r2,
        adj_r2,
        n_obs: n,
    })
}

fn fit_period(period: String, obs: &[&RegressionObs], benchmark_r2: f64, outcome: &mut RegressionOutcome) {
    if obs.len() <= REGRESSORS {
        outcome.skipped_small.push(period);
        return;
    }
    let y: Vec<f64> = obs.iter().map(|o| o.annual).collect();
    let x: Vec<Vec<f64>> = obs.iter().map(|o| o.quarters.to_vec()).collect();
    match ols(&y, &x) {
        Some(fit) => outcome.rows.push(RegressionRow {
            period,
            intercept: fit.coefficients[0],
            slopes: [
                fit.coefficients[1],
                fit.coefficients[2],
                fit.coefficients[3],
                fit.coefficients[4],
            ],
            r2: fit.r2,
            adj_r2: fit.adj_r2,
            abnormal_r2: fit.adj_r2 - benchmark_r2,
            n_obs: fit.n_obs,
        }),
        None => outcome.skipped_singular.push(period),
    }
}

/// One regression per year, in year order, then the pooled sample if asked.
pub fn run_regressions(
    sample: &[RegressionObs],
    benchmark_r2: f64,
    pooled: bool,
    reporter: &dyn PipelineReporter,
) -> RegressionOutcome {
    reporter.stage_started(Stage::Regression);
    let mut by_year: BTreeMap<i32, Vec<&RegressionObs>> = BTreeMap::new();
    for obs in sample {
        by_year.entry(obs.year).or_default().push(obs);
    }

    let mut outcome = RegressionOutcome::default();
    for (year, obs) in &by_year {
        fit_period(year.to_string(), obs, benchmark_r2, &mut outcome);
    }
    if pooled {
        let all: Vec<&RegressionObs> = sample.iter().collect();
        fit_period(POOLED_PERIOD.to_string(), &all, benchmark_r2, &mut outcome);
    }

    reporter.skipped(
        Stage::Regression,
        SkipReason::InsufficientSample,
        outcome.skipped_small.len(),
        &format!("periods with at most {REGRESSORS} observations"),
    );
    reporter.skipped(
        Stage::Regression,
        SkipReason::InsufficientSample,
        outcome.skipped_singular.len(),
        "periods with a singular design",
    );
    reporter.stage_finished(Stage::Regression, outcome.rows.len());
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use eventstudy_core::domain::Quarter;
    use eventstudy_core::report::RecordingReporter;

    const TRUE_BETA: [f64; 5] = [0.02, 0.8, 1.1, 0.9, 1.3];

    /// Quarterly returns that are not collinear across firms.
    fn quarters(i: usize) -> [f64; 4] {
        std::array::from_fn(|j| 0.05 * ((i as f64 + 1.0) * (j as f64 + 1.3) * 0.77).sin())
    }

    fn obs(year: i32, i: usize, noise: f64) -> RegressionObs {
        let q = quarters(i);
        let annual = TRUE_BETA[0] + (0..4).map(|j| TRUE_BETA[j + 1] * q[j]).sum::<f64>() + noise;
        RegressionObs {
            infocode: InfoCode(i as i64),
            year,
            annual,
            quarters: q,
        }
    }

    #[test]
    fn noiseless_sample_recovers_coefficients() {
        let sample: Vec<_> = (0..12).map(|i| obs(2020, i, 0.0)).collect();
        let out = run_regressions(&sample, 0.048, false, &RecordingReporter::new());
        assert_eq!(out.rows.len(), 1);
        let row = &out.rows[0];
        assert_eq!(row.period, "2020");
        assert!((row.intercept - TRUE_BETA[0]).abs() < 1e-8);
        for j in 0..4 {
            assert!((row.slopes[j] - TRUE_BETA[j + 1]).abs() < 1e-6);
        }
        assert!((row.r2 - 1.0).abs() < 1e-9);
        assert!((row.abnormal_r2 - (row.adj_r2 - 0.048)).abs() < 1e-12);
    }

    #[test]
    fn small_year_is_skipped_and_reported() {
        let mut sample: Vec<_> = (0..12)
            .map(|i| obs(2020, i, 0.01 * ((i as f64) * 2.1).cos()))
            .collect();
        sample.extend((0..3).map(|i| obs(2021, i, 0.0)));

        let reporter = RecordingReporter::new();
        let out = run_regressions(&sample, 0.048, true, &reporter);
        let periods: Vec<&str> = out.rows.iter().map(|r| r.period.as_str()).collect();
        assert_eq!(periods, vec!["2020", POOLED_PERIOD]);
        assert_eq!(out.skipped_small, vec!["2021".to_string()]);
        assert_eq!(out.rows[1].n_obs, 15);
        assert_eq!(
            reporter.skip_count(Stage::Regression, SkipReason::InsufficientSample),
            1
        );
        let r = &out.rows[0];
        assert!(r.r2 < 1.0 && r.adj_r2 < r.r2);
        let expected_adj = 1.0 - (1.0 - r.r2) * 11.0 / 7.0;
        assert!((r.adj_r2 - expected_adj).abs() < 1e-12);
    }

    #[test]
    fn collinear_design_is_singular() {
        let sample: Vec<_> = (0..10)
            .map(|i| {
                let v = 0.01 * i as f64;
                RegressionObs {
                    infocode: InfoCode(i as i64),
                    year: 2019,
                    annual: v * 3.0 + 0.001 * (i % 3) as f64,
                    quarters: [v, v, v, v],
                }
            })
            .collect();
        let out = run_regressions(&sample, 0.048, false, &RecordingReporter::new());
        assert!(out.rows.is_empty());
        assert_eq!(out.skipped_singular, vec!["2019".to_string()]);
    }

    #[test]
    fn sample_requires_all_four_quarters() {
        let d = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let event = |infocode: i64, quarter: Quarter| EventBhr {
            infocode: InfoCode(infocode),
            fiscal_year: 2020,
            year: 2021,
            quarter,
            rdq: d,
            day_0: d,
            bhr_3day: 0.01 * (quarter.index() as f64 + 1.0),
        };
        let mut events: Vec<EventBhr> = Quarter::ALL.iter().map(|q| event(1, *q)).collect();
        events.extend([Quarter::Q1, Quarter::Q2].map(|q| event(2, q)));
        let annual: Vec<AnnualBhr> = [1, 2, 3]
            .map(|id| AnnualBhr {
                infocode: InfoCode(id),
                year: 2021,
                bhr_annual: 0.1,
                trading_days: 250,
            })
            .to_vec();

        let (sample, incomplete) = build_regression_sample(&annual, &events);
        assert_eq!(sample.len(), 1);
        assert_eq!(sample[0].quarters, [0.01, 0.02, 0.03, 0.04]);
        assert_eq!(incomplete, 2);
    }
}
