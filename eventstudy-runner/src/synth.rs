//! Synthetic raw tables for demos and tests.
//!
//! Writes Worldscope, Datastream and link CSVs under the configured input
//! paths and column names. Output is a deterministic function of the seed.
//! The data is clearly fake: uniform daily returns with an occasional zero or
//! missing value, and four announcements per firm-year.

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;

use eventstudy_core::data::RawColumns;

use crate::config::InputPaths;

#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    pub firms: usize,
    pub start_year: i32,
    pub years: usize,
    pub seed: u64,
    /// Probability that a trading day has an exactly-zero return.
    pub zero_share: f64,
    /// Probability that a trading day has no return at all.
    pub missing_share: f64,
    /// Probability that one announcement date of a firm-year is blank.
    pub missing_date_share: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            firms: 25,
            start_year: 2015,
            years: 5,
            seed: 42,
            zero_share: 0.03,
            missing_share: 0.01,
            missing_date_share: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthSummary {
    pub worldscope_rows: usize,
    pub datastream_rows: usize,
    pub link_rows: usize,
}

/// Months of the Q1..Q4 announcements within a calendar year.
const ANNOUNCEMENT_MONTHS: [u32; 4] = [2, 5, 8, 11];

fn trading_days(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = from;
    while day <= to {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        day += Duration::days(1);
    }
    days
}

fn csv_writer(path: &Path) -> Result<csv::Writer<fs::File>> {
    if path.extension().and_then(|e| e.to_str()) != Some("csv") {
        bail!("synthetic tables are written as CSV; {} is not a .csv path", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    csv::Writer::from_path(path).with_context(|| format!("failed to create {}", path.display()))
}

pub fn write_synthetic(config: &SynthConfig, columns: &RawColumns, inputs: &InputPaths) -> Result<SynthSummary> {
    if config.years == 0 || config.firms == 0 {
        bail!("synthetic sample needs at least one firm and one year");
    }
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut summary = SynthSummary::default();
    let last_year = config.start_year + config.years as i32 - 1;

    let mut link = csv_writer(&inputs.link)?;
    link.write_record([&columns.link_code, &columns.link_infocode])?;
    for f in 0..config.firms {
        link.write_record([(1000 + f).to_string(), (50_000 + f).to_string()])?;
        summary.link_rows += 1;
    }
    link.flush()?;

    let mut ws = csv_writer(&inputs.worldscope)?;
    let mut header = vec![columns.ws_code.clone(), columns.fiscal_year.clone()];
    header.extend(columns.announcement_dates.iter().cloned());
    ws.write_record(&header)?;
    for f in 0..config.firms {
        for year in config.start_year..=last_year {
            let mut record = vec![(1000 + f).to_string(), (year - 1).to_string()];
            let blank = rng
                .gen_bool(config.missing_date_share)
                .then(|| rng.gen_range(0..4usize));
            for (q, month) in ANNOUNCEMENT_MONTHS.iter().enumerate() {
                let day = rng.gen_range(1..=28);
                let cell = match NaiveDate::from_ymd_opt(year, *month, day) {
                    Some(_) if blank == Some(q) => String::new(),
                    Some(date) if rng.gen_bool(0.2) => date.format("%m/%d/%Y").to_string(),
                    Some(date) => date.format("%Y-%m-%d").to_string(),
                    None => String::new(),
                };
                record.push(cell);
            }
            ws.write_record(&record)?;
            summary.worldscope_rows += 1;
        }
    }
    ws.flush()?;

    let mut ds = csv_writer(&inputs.datastream)?;
    ds.write_record([&columns.ds_infocode, &columns.market_date, &columns.return_column])?;
    let (Some(first), Some(last)) = (
        NaiveDate::from_ymd_opt(config.start_year, 1, 1),
        NaiveDate::from_ymd_opt(last_year + 1, 1, 31),
    ) else {
        bail!("synthetic date range out of bounds");
    };
    let days = trading_days(first, last);
    for f in 0..config.firms {
        let drift = rng.gen_range(-0.0005..0.001);
        for day in &days {
            let ret = if rng.gen_bool(config.missing_share) {
                String::new()
            } else if rng.gen_bool(config.zero_share) {
                "0.0".to_string()
            } else {
                format!("{:.6}", drift + rng.gen_range(-0.03..0.03))
            };
            ds.write_record([(50_000 + f).to_string(), day.format("%Y-%m-%d").to_string(), ret])?;
            summary.datastream_rows += 1;
        }
    }
    ds.flush()?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(dir: &Path) -> InputPaths {
        InputPaths {
            worldscope: dir.join("raw/ws.csv"),
            datastream: dir.join("raw/ds.csv"),
            link: dir.join("raw/link.csv"),
        }
    }

    #[test]
    fn same_seed_same_bytes() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let config = SynthConfig {
            firms: 3,
            years: 2,
            ..Default::default()
        };
        write_synthetic(&config, &RawColumns::default(), &inputs(a.path())).unwrap();
        write_synthetic(&config, &RawColumns::default(), &inputs(b.path())).unwrap();
        for name in ["raw/ws.csv", "raw/ds.csv", "raw/link.csv"] {
            assert_eq!(
                fs::read(a.path().join(name)).unwrap(),
                fs::read(b.path().join(name)).unwrap()
            );
        }
    }

    #[test]
    fn row_counts_follow_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = SynthConfig {
            firms: 4,
            years: 3,
            ..Default::default()
        };
        let summary = write_synthetic(&config, &RawColumns::default(), &inputs(dir.path())).unwrap();
        assert_eq!(summary.link_rows, 4);
        assert_eq!(summary.worldscope_rows, 12);
        let ws = fs::read_to_string(dir.path().join("raw/ws.csv")).unwrap();
        assert!(ws.starts_with("code,year_,item5901,item5902,item5903,item5904"));
    }

    #[test]
    fn parquet_paths_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = inputs(dir.path());
        paths.datastream = dir.path().join("ds.parquet");
        assert!(write_synthetic(&SynthConfig::default(), &RawColumns::default(), &paths).is_err());
    }
}
