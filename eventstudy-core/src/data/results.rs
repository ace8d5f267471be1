//! Persisted BHR tables. The analysis stage reads only these.

use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;

use super::dates::DateParser;
use super::error::DataError;
use super::schema::{require_columns, ANNUAL_BHR_COLUMNS, EVENT_BHR_COLUMNS};
use super::table::{date_column, frame, parse_date, parse_f64, parse_i64, read_table, text_column, write_table};
use crate::domain::{AnnualBhr, EventBhr, InfoCode, Quarter};

const EVENT_BHR: &str = "bhr_event";
const ANNUAL_BHR: &str = "bhr_annual";

pub fn event_bhr_frame(results: &[EventBhr]) -> Result<DataFrame, DataError> {
    let rdq: Vec<Option<NaiveDate>> = results.iter().map(|r| Some(r.rdq)).collect();
    let day_0: Vec<Option<NaiveDate>> = results.iter().map(|r| Some(r.day_0)).collect();
    frame(vec![
        Column::new("infocode".into(), results.iter().map(|r| r.infocode.0).collect::<Vec<i64>>()),
        Column::new(
            "fiscal_year".into(),
            results.iter().map(|r| r.fiscal_year).collect::<Vec<i32>>(),
        ),
        Column::new("year".into(), results.iter().map(|r| r.year).collect::<Vec<i32>>()),
        Column::new(
            "quarter".into(),
            results.iter().map(|r| r.quarter.label()).collect::<Vec<&str>>(),
        ),
        date_column("rdq", &rdq)?,
        date_column("day_0", &day_0)?,
        Column::new("bhr_3day".into(), results.iter().map(|r| r.bhr_3day).collect::<Vec<f64>>()),
    ])
}

pub fn annual_bhr_frame(results: &[AnnualBhr]) -> Result<DataFrame, DataError> {
    frame(vec![
        Column::new("infocode".into(), results.iter().map(|r| r.infocode.0).collect::<Vec<i64>>()),
        Column::new("year".into(), results.iter().map(|r| r.year).collect::<Vec<i32>>()),
        Column::new(
            "bhr_annual".into(),
            results.iter().map(|r| r.bhr_annual).collect::<Vec<f64>>(),
        ),
        Column::new(
            "trading_days".into(),
            results.iter().map(|r| r.trading_days as u64).collect::<Vec<u64>>(),
        ),
    ])
}

pub fn write_event_bhr(results: &[EventBhr], paths: &[&Path]) -> Result<(), DataError> {
    let mut df = event_bhr_frame(results)?;
    for path in paths {
        write_table(&mut df, path)?;
    }
    Ok(())
}

pub fn write_annual_bhr(results: &[AnnualBhr], paths: &[&Path]) -> Result<(), DataError> {
    let mut df = annual_bhr_frame(results)?;
    for path in paths {
        write_table(&mut df, path)?;
    }
    Ok(())
}

fn invalid(table: &str, row: usize, column: &str) -> DataError {
    DataError::Validation(format!("{table} row {row}: unreadable '{column}'"))
}

pub fn read_event_bhr(path: &Path) -> Result<Vec<EventBhr>, DataError> {
    let df = read_table(path)?;
    require_columns(&df, EVENT_BHR, EVENT_BHR_COLUMNS)?;
    let parser = DateParser::default();
    let infocodes = text_column(&df, EVENT_BHR, "infocode")?;
    let fiscal_years = text_column(&df, EVENT_BHR, "fiscal_year")?;
    let years = text_column(&df, EVENT_BHR, "year")?;
    let quarters = text_column(&df, EVENT_BHR, "quarter")?;
    let rdq = text_column(&df, EVENT_BHR, "rdq")?;
    let day_0 = text_column(&df, EVENT_BHR, "day_0")?;
    let bhr = text_column(&df, EVENT_BHR, "bhr_3day")?;

    (0..df.height())
        .map(|i| {
            let year = |col: &[Option<String>], name: &str| {
                parse_i64(col[i].as_deref())
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| invalid(EVENT_BHR, i, name))
            };
            Ok(EventBhr {
                infocode: parse_i64(infocodes[i].as_deref())
                    .map(InfoCode)
                    .ok_or_else(|| invalid(EVENT_BHR, i, "infocode"))?,
                fiscal_year: year(&fiscal_years, "fiscal_year")?,
                year: year(&years, "year")?,
                quarter: quarters[i]
                    .as_deref()
                    .and_then(Quarter::parse)
                    .ok_or_else(|| invalid(EVENT_BHR, i, "quarter"))?,
                rdq: parse_date(rdq[i].as_deref(), &parser)
                    .ok_or_else(|| invalid(EVENT_BHR, i, "rdq"))?,
                day_0: parse_date(day_0[i].as_deref(), &parser)
                    .ok_or_else(|| invalid(EVENT_BHR, i, "day_0"))?,
                bhr_3day: parse_f64(bhr[i].as_deref())
                    .ok_or_else(|| invalid(EVENT_BHR, i, "bhr_3day"))?,
            })
        })
        .collect()
}

pub fn read_annual_bhr(path: &Path) -> Result<Vec<AnnualBhr>, DataError> {
    let df = read_table(path)?;
    require_columns(&df, ANNUAL_BHR, ANNUAL_BHR_COLUMNS)?;
    let infocodes = text_column(&df, ANNUAL_BHR, "infocode")?;
    let years = text_column(&df, ANNUAL_BHR, "year")?;
    let bhr = text_column(&df, ANNUAL_BHR, "bhr_annual")?;
    let days = text_column(&df, ANNUAL_BHR, "trading_days")?;

    (0..df.height())
        .map(|i| {
            Ok(AnnualBhr {
                infocode: parse_i64(infocodes[i].as_deref())
                    .map(InfoCode)
                    .ok_or_else(|| invalid(ANNUAL_BHR, i, "infocode"))?,
                year: parse_i64(years[i].as_deref())
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| invalid(ANNUAL_BHR, i, "year"))?,
                bhr_annual: parse_f64(bhr[i].as_deref())
                    .ok_or_else(|| invalid(ANNUAL_BHR, i, "bhr_annual"))?,
                trading_days: parse_i64(days[i].as_deref())
                    .and_then(|v| usize::try_from(v).ok())
                    .ok_or_else(|| invalid(ANNUAL_BHR, i, "trading_days"))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn bhr_tables_read_back_from_both_formats() {
        let events = vec![EventBhr {
            infocode: InfoCode(3),
            fiscal_year: 2020,
            year: 2021,
            quarter: Quarter::Q3,
            rdq: d(2021, 8, 14),
            day_0: d(2021, 8, 16),
            bhr_3day: 0.019994,
        }];
        let annual = vec![AnnualBhr {
            infocode: InfoCode(3),
            year: 2021,
            bhr_annual: -0.125,
            trading_days: 252,
        }];
        let dir = tempfile::tempdir().unwrap();
        for ext in ["csv", "parquet"] {
            let event_path = dir.path().join(format!("bhr_event.{ext}"));
            let annual_path = dir.path().join(format!("bhr_annual.{ext}"));
            write_event_bhr(&events, &[event_path.as_path()]).unwrap();
            write_annual_bhr(&annual, &[annual_path.as_path()]).unwrap();
            assert_eq!(read_event_bhr(&event_path).unwrap(), events);
            assert_eq!(read_annual_bhr(&annual_path).unwrap(), annual);
        }
    }

    #[test]
    fn event_table_without_bhr_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        let mut df = df!("infocode" => &[1i64]).unwrap();
        write_table(&mut df, &path).unwrap();
        assert!(matches!(
            read_event_bhr(&path),
            Err(DataError::MissingColumn { .. })
        ));
    }
}
