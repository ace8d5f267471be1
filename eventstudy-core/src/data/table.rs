//! Polars-backed table I/O.
//!
//! Every checkpoint is persisted twice, as CSV and as Parquet, and either copy
//! can be read back. Reads go through [`read_table`], which picks the reader
//! from the file extension. CSV is read with schema inference disabled so that
//! every column arrives as text; typed parsing happens in the callers, which
//! keeps CSV and Parquet inputs on the same code path.
//!
//! Writes are atomic: write to `{path}.tmp`, then rename into place.

use chrono::NaiveDate;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use super::dates::{to_epoch_days, DateParser};
use super::error::DataError;

/// On-disk table format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Ok(TableFormat::Csv),
            Some("parquet") | Some("pq") => Ok(TableFormat::Parquet),
            _ => Err(DataError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Read a CSV or Parquet file into a DataFrame.
pub fn read_table(path: &Path) -> Result<DataFrame, DataError> {
    if !path.exists() {
        return Err(DataError::MissingInput(path.to_path_buf()));
    }
    match TableFormat::from_path(path)? {
        TableFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| DataError::Csv(format!("read {}: {e}", path.display()))),
        TableFormat::Parquet => {
            let file = fs::File::open(path)
                .map_err(|e| DataError::Io(format!("open {}: {e}", path.display())))?;
            ParquetReader::new(file)
                .finish()
                .map_err(|e| DataError::Parquet(format!("read {}: {e}", path.display())))
        }
    }
}

/// Write a DataFrame to CSV or Parquet according to the path's extension.
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let format = TableFormat::from_path(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| DataError::Io(format!("create dir {}: {e}", parent.display())))?;
    }

    let tmp_path = tmp_path_for(path);
    let written = match format {
        TableFormat::Csv => write_csv(df, &tmp_path),
        TableFormat::Parquet => write_parquet(df, &tmp_path),
    };
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DataError::Io(format!("atomic rename to {}: {e}", path.display()))
    })
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let mut file = fs::File::create(path)
        .map_err(|e| DataError::Io(format!("create {}: {e}", path.display())))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| DataError::Csv(format!("write {}: {e}", path.display())))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file = fs::File::create(path)
        .map_err(|e| DataError::Io(format!("create {}: {e}", path.display())))?;
    ParquetWriter::new(file)
        .finish(df)
        .map(|_| ())
        .map_err(|e| DataError::Parquet(format!("write {}: {e}", path.display())))
}

// ── Column extraction ───────────────────────────────────────────────

/// A column rendered as text, one entry per row (`None` for nulls).
///
/// Dates come out as `YYYY-MM-DD` whether the source was a CSV string or a
/// Parquet `Date` column.
pub fn text_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<String>>, DataError> {
    let column = df.column(name).map_err(|_| DataError::MissingColumn {
        table: table.to_string(),
        column: name.to_string(),
    })?;
    let as_text = column
        .cast(&DataType::String)
        .map_err(|e| DataError::Frame(format!("{table}.{name} as text: {e}")))?;
    let values = as_text
        .str()
        .map_err(|e| DataError::Frame(format!("{table}.{name} as text: {e}")))?;
    Ok(values
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect())
}

/// Parse a text cell as a float. `NaN`, `nan` and blanks count as missing.
pub fn parse_f64(raw: Option<&str>) -> Option<f64> {
    let v = raw?.trim().parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

/// Parse a text cell as an integer, accepting integral floats.
pub fn parse_i64(raw: Option<&str>) -> Option<i64> {
    crate::domain::ids::parse_integral(raw?)
}

/// Parse a text cell as a date using the given parser.
pub fn parse_date(raw: Option<&str>, parser: &DateParser) -> Option<NaiveDate> {
    parser.parse(raw?)
}

// ── Column construction ─────────────────────────────────────────────

/// Build a `Date` column from optional dates.
pub fn date_column(name: &str, dates: &[Option<NaiveDate>]) -> Result<Column, DataError> {
    let days: Vec<Option<i32>> = dates.iter().map(|d| d.map(to_epoch_days)).collect();
    Column::new(name.into(), days)
        .cast(&DataType::Date)
        .map_err(|e| DataError::Frame(format!("date cast for '{name}': {e}")))
}

/// Assemble columns into a DataFrame.
pub fn frame(columns: Vec<Column>) -> Result<DataFrame, DataError> {
    DataFrame::new(columns).map_err(|e| DataError::Frame(format!("dataframe creation: {e}")))
}
