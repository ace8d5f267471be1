//! Prepared panel: one row per selected firm-year with its day-0 matches.
//!
//! This is the checkpoint between preparation and BHR computation. It is
//! written as both CSV and Parquet and can be read back from either.

use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

use super::dates::DateParser;
use super::error::DataError;
use super::schema::{require_columns, PREPARED_COLUMNS};
use super::table::{date_column, frame, parse_date, parse_f64, parse_i64, read_table, text_column, write_table};
use crate::domain::{FirmYearRecord, InfoCode, MatchedRow, Quarter, WsCode};

const PREPARED: &str = "prepared";

/// Day-0 match of one quarter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayZeroMatch {
    pub date: NaiveDate,
    pub ret: f64,
    pub deviation_days: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRow {
    pub record: FirmYearRecord,
    /// Calendar year of the four announcements.
    pub year: i32,
    pub day_0: [Option<DayZeroMatch>; 4],
}

/// Attach each record's offset-0 matches.
///
/// `matched` should be the matcher output before shifting, so the panel shows
/// how announcement dates aligned with the trading calendar.
pub fn build_prepared(records: &[FirmYearRecord], matched: &[MatchedRow]) -> Vec<PreparedRow> {
    let mut day_0: BTreeMap<(InfoCode, i32, Quarter), DayZeroMatch> = BTreeMap::new();
    for row in matched.iter().filter(|r| r.offset == 0) {
        day_0
            .entry((row.event.infocode, row.event.fiscal_year, row.event.quarter))
            .or_insert(DayZeroMatch {
                date: row.date,
                ret: row.ret,
                deviation_days: row.deviation_days,
            });
    }

    records
        .iter()
        .map(|record| PreparedRow {
            year: record.announcement_year().unwrap_or(record.fiscal_year),
            day_0: Quarter::ALL.map(|q| {
                day_0.get(&(record.infocode, record.fiscal_year, q)).copied()
            }),
            record: record.clone(),
        })
        .collect()
}

pub fn prepared_frame(rows: &[PreparedRow]) -> Result<DataFrame, DataError> {
    let mut columns = vec![
        Column::new("code".into(), rows.iter().map(|r| r.record.code.0).collect::<Vec<i64>>()),
        Column::new(
            "infocode".into(),
            rows.iter().map(|r| r.record.infocode.0).collect::<Vec<i64>>(),
        ),
        Column::new(
            "fiscal_year".into(),
            rows.iter().map(|r| r.record.fiscal_year).collect::<Vec<i32>>(),
        ),
        Column::new("year".into(), rows.iter().map(|r| r.year).collect::<Vec<i32>>()),
    ];
    for q in Quarter::ALL {
        let dates: Vec<Option<NaiveDate>> = rows.iter().map(|r| r.record.rdq(q)).collect();
        columns.push(date_column(&format!("rdq_{}", q.label().to_lowercase()), &dates)?);
    }
    columns.push(Column::new(
        "reported_annual_return".into(),
        rows.iter()
            .map(|r| r.record.reported_annual_return)
            .collect::<Vec<Option<f64>>>(),
    ));
    for q in Quarter::ALL {
        let prefix = q.label().to_lowercase();
        let matches: Vec<Option<DayZeroMatch>> = rows.iter().map(|r| r.day_0[q.index()]).collect();
        let dates: Vec<Option<NaiveDate>> = matches.iter().map(|m| m.map(|m| m.date)).collect();
        columns.push(date_column(&format!("{prefix}_day_0"), &dates)?);
        columns.push(Column::new(
            format!("{prefix}_ret").into(),
            matches.iter().map(|m| m.map(|m| m.ret)).collect::<Vec<Option<f64>>>(),
        ));
        columns.push(Column::new(
            format!("{prefix}_day_0_deviation").into(),
            matches
                .iter()
                .map(|m| m.map(|m| m.deviation_days))
                .collect::<Vec<Option<i64>>>(),
        ));
    }
    frame(columns)
}

/// Write the panel to every given path (format from each extension).
pub fn write_prepared(rows: &[PreparedRow], paths: &[&Path]) -> Result<(), DataError> {
    let mut df = prepared_frame(rows)?;
    for path in paths {
        write_table(&mut df, path)?;
    }
    Ok(())
}

pub fn read_prepared(path: &Path) -> Result<Vec<PreparedRow>, DataError> {
    let df = read_table(path)?;
    prepared_from_frame(&df)
}

pub fn prepared_from_frame(df: &DataFrame) -> Result<Vec<PreparedRow>, DataError> {
    require_columns(df, PREPARED, PREPARED_COLUMNS)?;
    let parser = DateParser::default();
    let text = |name: &str| text_column(df, PREPARED, name);

    let codes = text("code")?;
    let infocodes = text("infocode")?;
    let fiscal_years = text("fiscal_year")?;
    let years = text("year")?;
    let annual = text("reported_annual_return")?;
    let mut rdq = Vec::with_capacity(4);
    let mut day_0 = Vec::with_capacity(4);
    for q in Quarter::ALL {
        let prefix = q.label().to_lowercase();
        rdq.push(text(&format!("rdq_{prefix}"))?);
        day_0.push((
            text(&format!("{prefix}_day_0"))?,
            text(&format!("{prefix}_ret"))?,
            text(&format!("{prefix}_day_0_deviation"))?,
        ));
    }

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let int = |col: &[Option<String>]| parse_i64(col[i].as_deref());
        let year_of = |col: &[Option<String>]| int(col).and_then(|v| i32::try_from(v).ok());
        let (Some(code), Some(infocode), Some(fiscal_year), Some(year)) = (
            int(&codes),
            int(&infocodes),
            year_of(&fiscal_years),
            year_of(&years),
        ) else {
            return Err(DataError::Validation(format!(
                "prepared row {i} has a missing code, infocode or year"
            )));
        };
        rows.push(PreparedRow {
            record: FirmYearRecord {
                code: WsCode(code),
                infocode: InfoCode(infocode),
                fiscal_year,
                announcement_dates: std::array::from_fn(|q| parse_date(rdq[q][i].as_deref(), &parser)),
                reported_annual_return: parse_f64(annual[i].as_deref()),
            },
            year,
            day_0: std::array::from_fn(|q| {
                let (dates, rets, devs) = &day_0[q];
                Some(DayZeroMatch {
                    date: parse_date(dates[i].as_deref(), &parser)?,
                    ret: parse_f64(rets[i].as_deref())?,
                    deviation_days: parse_i64(devs[i].as_deref())?,
                })
            }),
        });
    }
    Ok(rows)
}
