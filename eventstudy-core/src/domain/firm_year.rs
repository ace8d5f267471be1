use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::event::Quarter;
use super::ids::{InfoCode, WsCode};

/// A linked Worldscope firm-year: one row per (code, infocode, fiscal year).
///
/// `announcement_dates` holds the Q1..Q4 report dates in quarter order. They
/// are optional until the earnings filter has run; afterwards every record
/// carries four dates in the same calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmYearRecord {
    pub code: WsCode,
    pub infocode: InfoCode,
    pub fiscal_year: i32,
    pub announcement_dates: [Option<NaiveDate>; 4],
    pub reported_annual_return: Option<f64>,
}

impl FirmYearRecord {
    /// Announcement date for a quarter.
    pub fn rdq(&self, quarter: Quarter) -> Option<NaiveDate> {
        self.announcement_dates[quarter.index()]
    }

    /// All four dates, if none is missing.
    pub fn complete_dates(&self) -> Option<[NaiveDate; 4]> {
        let [a, b, c, d] = self.announcement_dates;
        Some([a?, b?, c?, d?])
    }

    /// Calendar year shared by all four announcements, if they agree.
    pub fn announcement_year(&self) -> Option<i32> {
        let dates = self.complete_dates()?;
        let year = dates[0].year();
        dates.iter().all(|d| d.year() == year).then_some(year)
    }
}
