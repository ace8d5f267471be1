//! Required-column checks for the raw and persisted tables.

use polars::prelude::*;

use super::error::DataError;

/// Column names of the prepared panel, in write order.
pub const PREPARED_COLUMNS: &[&str] = &[
    "code",
    "infocode",
    "fiscal_year",
    "year",
    "rdq_q1",
    "rdq_q2",
    "rdq_q3",
    "rdq_q4",
    "reported_annual_return",
    "q1_day_0",
    "q1_ret",
    "q1_day_0_deviation",
    "q2_day_0",
    "q2_ret",
    "q2_day_0_deviation",
    "q3_day_0",
    "q3_ret",
    "q3_day_0_deviation",
    "q4_day_0",
    "q4_ret",
    "q4_day_0_deviation",
];

/// Column names of the event BHR table.
pub const EVENT_BHR_COLUMNS: &[&str] = &[
    "infocode",
    "fiscal_year",
    "year",
    "quarter",
    "rdq",
    "day_0",
    "bhr_3day",
];

/// Column names of the annual BHR table.
pub const ANNUAL_BHR_COLUMNS: &[&str] = &["infocode", "year", "bhr_annual", "trading_days"];

/// Fail with `MissingColumn` for the first required column absent from `df`.
pub fn require_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<(), DataError> {
    let schema = df.schema();
    for column in columns {
        if !schema.contains(column) {
            return Err(DataError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}
