//! Calendar-date parsing and the day-number encoding used by Date columns.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Encode a date as days since the Unix epoch (Polars/Arrow `Date`).
pub fn to_epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Decode days since the Unix epoch.
pub fn from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Tries a list of `strftime` formats in order.
///
/// Datetime text (`2020-03-15 00:00:00`, `2020-03-15T00:00:00`) is reduced to
/// its date part before matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateParser {
    formats: Vec<String>,
}

impl DateParser {
    pub fn new(formats: Vec<String>) -> Self {
        Self { formats }
    }

    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.parse_exact(trimmed).or_else(|| {
            let date_part = trimmed.split([' ', 'T']).next()?;
            if date_part.len() == trimmed.len() {
                None
            } else {
                self.parse_exact(date_part)
            }
        })
    }

    fn parse_exact(&self, text: &str) -> Option<NaiveDate> {
        self.formats
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
    }
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new(default_date_formats())
    }
}

pub fn default_date_formats() -> Vec<String> {
    vec!["%Y-%m-%d".into(), "%m/%d/%y".into(), "%m/%d/%Y".into()]
}
