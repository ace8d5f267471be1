//! Raw input tables: Worldscope fundamentals, Datastream daily returns, and
//! the Worldscope/Datastream linking table.
//!
//! Parsing is row-tolerant: rows with an unusable key are dropped and counted
//! through the reporter, never fatal. Missing files and missing columns are
//! fatal.

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::dates::{default_date_formats, DateParser};
use super::error::DataError;
use super::schema::require_columns;
use super::table::{parse_date, parse_f64, parse_i64, read_table, text_column};
use crate::domain::{InfoCode, TradingObservation, WsCode};
use crate::report::{PipelineReporter, SkipReason, Stage};

/// Column names in the raw tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawColumns {
    pub ws_code: String,
    pub fiscal_year: String,
    /// Q1..Q4 announcement-date columns, in quarter order.
    pub announcement_dates: Vec<String>,
    pub reported_annual_return: Option<String>,
    pub ds_infocode: String,
    pub market_date: String,
    pub return_column: String,
    pub link_code: String,
    pub link_infocode: String,
    pub date_formats: Vec<String>,
}

impl Default for RawColumns {
    fn default() -> Self {
        Self {
            ws_code: "code".into(),
            fiscal_year: "year_".into(),
            announcement_dates: vec![
                "item5901".into(),
                "item5902".into(),
                "item5903".into(),
                "item5904".into(),
            ],
            reported_annual_return: None,
            ds_infocode: "infocode".into(),
            market_date: "marketdate".into(),
            return_column: "ret".into(),
            link_code: "code".into(),
            link_infocode: "infocode".into(),
            date_formats: default_date_formats(),
        }
    }
}

impl RawColumns {
    pub fn date_parser(&self) -> DateParser {
        DateParser::new(self.date_formats.clone())
    }
}

/// What to do with a trading day whose return is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReturnPolicy {
    /// Drop the observation and count it.
    #[default]
    Drop,
    /// Keep the observation with a zero return; it then becomes a shift candidate.
    Zero,
}

/// One Worldscope firm-year before linkage.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldscopeRow {
    pub code: WsCode,
    pub fiscal_year: i32,
    pub announcement_dates: [Option<NaiveDate>; 4],
    pub reported_annual_return: Option<f64>,
}

/// One linking-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRow {
    pub code: WsCode,
    pub infocode: InfoCode,
}

/// Trading observations plus the counts of what parsing did to them.
#[derive(Debug, Clone, Default)]
pub struct ObservationLoad {
    pub observations: Vec<TradingObservation>,
    pub dropped_missing_key: usize,
    pub missing_returns: usize,
}

const WORLDSCOPE: &str = "worldscope";
const DATASTREAM: &str = "datastream";
const LINK: &str = "link";

pub fn load_worldscope(
    path: &Path,
    columns: &RawColumns,
    reporter: &dyn PipelineReporter,
) -> Result<Vec<WorldscopeRow>, DataError> {
    let df = read_table(path)?;
    worldscope_from_frame(&df, columns, reporter)
}

pub fn worldscope_from_frame(
    df: &DataFrame,
    columns: &RawColumns,
    reporter: &dyn PipelineReporter,
) -> Result<Vec<WorldscopeRow>, DataError> {
    if columns.announcement_dates.len() != 4 {
        return Err(DataError::Validation(format!(
            "expected 4 announcement-date columns, got {}",
            columns.announcement_dates.len()
        )));
    }
    let mut required = vec![columns.ws_code.as_str(), columns.fiscal_year.as_str()];
    required.extend(columns.announcement_dates.iter().map(String::as_str));
    if let Some(ret_col) = &columns.reported_annual_return {
        required.push(ret_col.as_str());
    }
    require_columns(df, WORLDSCOPE, &required)?;

    let parser = columns.date_parser();
    let codes = text_column(df, WORLDSCOPE, &columns.ws_code)?;
    let years = text_column(df, WORLDSCOPE, &columns.fiscal_year)?;
    let mut quarter_dates = Vec::with_capacity(4);
    for name in &columns.announcement_dates {
        quarter_dates.push(text_column(df, WORLDSCOPE, name)?);
    }
    let annual = match &columns.reported_annual_return {
        Some(name) => Some(text_column(df, WORLDSCOPE, name)?),
        None => None,
    };

    let mut rows = Vec::with_capacity(df.height());
    let mut dropped = 0usize;
    for i in 0..df.height() {
        let code = codes[i].as_deref().and_then(WsCode::parse);
        let fiscal_year = parse_i64(years[i].as_deref()).and_then(|y| i32::try_from(y).ok());
        let (Some(code), Some(fiscal_year)) = (code, fiscal_year) else {
            dropped += 1;
            continue;
        };
        let announcement_dates =
            std::array::from_fn(|q| parse_date(quarter_dates[q][i].as_deref(), &parser));
        rows.push(WorldscopeRow {
            code,
            fiscal_year,
            announcement_dates,
            reported_annual_return: annual.as_ref().and_then(|a| parse_f64(a[i].as_deref())),
        });
    }

    reporter.skipped(
        Stage::Load,
        SkipReason::MissingData,
        dropped,
        "worldscope rows without a usable code or fiscal year",
    );
    Ok(rows)
}

pub fn load_link(
    path: &Path,
    columns: &RawColumns,
    reporter: &dyn PipelineReporter,
) -> Result<Vec<LinkRow>, DataError> {
    let df = read_table(path)?;
    link_from_frame(&df, columns, reporter)
}

pub fn link_from_frame(
    df: &DataFrame,
    columns: &RawColumns,
    reporter: &dyn PipelineReporter,
) -> Result<Vec<LinkRow>, DataError> {
    require_columns(
        df,
        LINK,
        &[columns.link_code.as_str(), columns.link_infocode.as_str()],
    )?;
    let codes = text_column(df, LINK, &columns.link_code)?;
    let infocodes = text_column(df, LINK, &columns.link_infocode)?;

    let mut rows = Vec::with_capacity(df.height());
    let mut dropped = 0usize;
    for (code, infocode) in codes.iter().zip(&infocodes) {
        match (
            code.as_deref().and_then(WsCode::parse),
            infocode.as_deref().and_then(InfoCode::parse),
        ) {
            (Some(code), Some(infocode)) => rows.push(LinkRow { code, infocode }),
            _ => dropped += 1,
        }
    }

    reporter.skipped(
        Stage::Load,
        SkipReason::MissingData,
        dropped,
        "link rows with a missing key",
    );
    Ok(rows)
}

pub fn load_observations(
    path: &Path,
    columns: &RawColumns,
    policy: MissingReturnPolicy,
    reporter: &dyn PipelineReporter,
) -> Result<ObservationLoad, DataError> {
    let df = read_table(path)?;
    observations_from_frame(&df, columns, policy, reporter)
}

pub fn observations_from_frame(
    df: &DataFrame,
    columns: &RawColumns,
    policy: MissingReturnPolicy,
    reporter: &dyn PipelineReporter,
) -> Result<ObservationLoad, DataError> {
    require_columns(
        df,
        DATASTREAM,
        &[
            columns.ds_infocode.as_str(),
            columns.market_date.as_str(),
            columns.return_column.as_str(),
        ],
    )?;
    let parser = columns.date_parser();
    let infocodes = text_column(df, DATASTREAM, &columns.ds_infocode)?;
    let dates = text_column(df, DATASTREAM, &columns.market_date)?;
    let returns = text_column(df, DATASTREAM, &columns.return_column)?;

    let mut load = ObservationLoad {
        observations: Vec::with_capacity(df.height()),
        ..Default::default()
    };
    for i in 0..df.height() {
        let infocode = infocodes[i].as_deref().and_then(InfoCode::parse);
        let date = parse_date(dates[i].as_deref(), &parser);
        let (Some(infocode), Some(date)) = (infocode, date) else {
            load.dropped_missing_key += 1;
            continue;
        };
        let ret = match parse_f64(returns[i].as_deref()) {
            Some(r) => r,
            None => {
                load.missing_returns += 1;
                match policy {
                    MissingReturnPolicy::Drop => continue,
                    MissingReturnPolicy::Zero => 0.0,
                }
            }
        };
        load.observations.push(TradingObservation::new(infocode, date, ret));
    }

    reporter.skipped(
        Stage::Load,
        SkipReason::MissingData,
        load.dropped_missing_key,
        "datastream rows without a usable infocode or market date",
    );
    match policy {
        MissingReturnPolicy::Drop => reporter.skipped(
            Stage::Load,
            SkipReason::MissingData,
            load.missing_returns,
            "datastream rows with a null return dropped",
        ),
        MissingReturnPolicy::Zero => reporter.note(
            Stage::Load,
            &format!("replaced {} null returns with 0", load.missing_returns),
        ),
    }
    Ok(load)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RecordingReporter;
    use polars::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn worldscope_rows_parse_mixed_date_formats() {
        let df = df!(
            "code" => &[Some("1"), Some("2"), None],
            "year_" => &[Some("2019"), Some("2019"), Some("2019")],
            "item5901" => &[Some("02/20/20"), Some("2020-02-21"), Some("2020-02-21")],
            "item5902" => &[Some("05/20/20"), None, Some("2020-05-21")],
            "item5903" => &[Some("08/20/20"), Some("2020-08-21"), Some("2020-08-21")],
            "item5904" => &[Some("11/20/20"), Some("2020-11-21"), Some("2020-11-21")],
        )
        .unwrap();
        let reporter = RecordingReporter::new();
        let rows = worldscope_from_frame(&df, &RawColumns::default(), &reporter).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].announcement_dates[0], Some(d(2020, 2, 20)));
        assert_eq!(rows[1].announcement_dates[1], None);
        assert_eq!(reporter.skip_count(Stage::Load, SkipReason::MissingData), 1);
    }

    #[test]
    fn worldscope_requires_announcement_columns() {
        let df = df!("code" => &["1"], "year_" => &["2019"]).unwrap();
        let err = worldscope_from_frame(&df, &RawColumns::default(), &RecordingReporter::new())
            .unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { .. }));
    }

    #[test]
    fn null_returns_follow_policy() {
        let df = df!(
            "infocode" => &[Some("5"), Some("5"), Some("5"), None],
            "marketdate" => &[Some("2020-01-02"), Some("2020-01-03"), Some("2020-01-06"), Some("2020-01-07")],
            "ret" => &[Some("0.01"), None, Some("-0.02"), Some("0.03")],
        )
        .unwrap();

        let reporter = RecordingReporter::new();
        let dropped = observations_from_frame(
            &df,
            &RawColumns::default(),
            MissingReturnPolicy::Drop,
            &reporter,
        )
        .unwrap();
        assert_eq!(dropped.observations.len(), 2);
        assert_eq!(dropped.missing_returns, 1);
        assert_eq!(dropped.dropped_missing_key, 1);
        assert_eq!(reporter.skip_count(Stage::Load, SkipReason::MissingData), 2);

        let zeroed = observations_from_frame(
            &df,
            &RawColumns::default(),
            MissingReturnPolicy::Zero,
            &RecordingReporter::new(),
        )
        .unwrap();
        assert_eq!(zeroed.observations.len(), 3);
        assert_eq!(zeroed.observations[1].ret, 0.0);
        assert_eq!(zeroed.observations[1].date, d(2020, 1, 3));
    }

    #[test]
    fn link_rows_skip_missing_keys() {
        let df = df!(
            "code" => &[Some("1"), Some("2"), None],
            "infocode" => &[Some("10"), None, Some("30")],
        )
        .unwrap();
        let rows = link_from_frame(&df, &RawColumns::default(), &RecordingReporter::new()).unwrap();
        assert_eq!(rows, vec![LinkRow { code: WsCode(1), infocode: InfoCode(10) }]);
    }
}
