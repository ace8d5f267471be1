use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for table I/O and schema checks.
///
/// Everything here is fatal for a run: a missing input, an unreadable file or
/// a missing required column cannot be skipped row by row.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("unsupported table format for {} (expected .csv or .parquet)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("dataframe error: {0}")]
    Frame(String),

    #[error("validation error: {0}")]
    Validation(String),
}
