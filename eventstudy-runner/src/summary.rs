//! Descriptive statistics for the BHR tables.
//!
//! One row for calendar-year returns and one per quarter for the three-day
//! announcement-window returns. All functions are pure: returns in, scalars
//! out. Empty inputs yield `None` rather than NaN.

use serde::{Deserialize, Serialize};

use eventstudy_core::domain::{AnnualBhr, EventBhr, Quarter};

pub const ANNUAL_CATEGORY: &str = "Calendar-Year Returns";

pub fn quarter_category(quarter: Quarter) -> String {
    format!("Earnings-Announcement Window Returns in {quarter}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub category: String,
    pub n_obs: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub skewness: Option<f64>,
    /// Percentage (0-100) of observations exactly equal to zero.
    pub pct_zero: Option<f64>,
    /// Percentage (0-100) of strictly positive observations.
    pub pct_positive: Option<f64>,
}

pub fn describe(category: impl Into<String>, values: &[f64]) -> SummaryRow {
    let n = values.len();
    let pct = |pred: fn(f64) -> bool| {
        (n > 0).then(|| values.iter().filter(|v| pred(**v)).count() as f64 / n as f64 * 100.0)
    };
    SummaryRow {
        category: category.into(),
        n_obs: n,
        mean: mean(values),
        median: median(values),
        skewness: skewness(values),
        pct_zero: pct(|v| v == 0.0),
        pct_positive: pct(|v| v > 0.0),
    }
}

pub fn summary_statistics(annual: &[AnnualBhr], events: &[EventBhr]) -> Vec<SummaryRow> {
    let annual_returns: Vec<f64> = annual.iter().map(|a| a.bhr_annual).collect();
    let mut rows = vec![describe(ANNUAL_CATEGORY, &annual_returns)];
    for quarter in Quarter::ALL {
        let returns: Vec<f64> = events
            .iter()
            .filter(|e| e.quarter == quarter)
            .map(|e| e.bhr_3day)
            .collect();
        rows.push(describe(quarter_category(quarter), &returns));
    }
    rows
}

pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Sample skewness with the small-sample adjustment
/// `sqrt(n(n-1)) / (n-2) * m3 / m2^1.5`, where `m2` and `m3` are the biased
/// central moments. Needs three observations; a constant series has zero skew.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let mean = mean(values)?;
    let nf = n as f64;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / nf;
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / nf;
    if m2 < 1e-15 {
        return Some(0.0);
    }
    Some((nf * (nf - 1.0)).sqrt() / (nf - 2.0) * m3 / m2.powf(1.5))
}
