use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::InfoCode;

/// Fiscal quarter label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    /// Zero-based position (Q1 = 0).
    pub fn index(self) -> usize {
        match self {
            Quarter::Q1 => 0,
            Quarter::Q2 => 1,
            Quarter::Q3 => 2,
            Quarter::Q4 => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "Q1" => Some(Quarter::Q1),
            "Q2" => Some(Quarter::Q2),
            "Q3" => Some(Quarter::Q3),
            "Q4" => Some(Quarter::Q4),
            _ => None,
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of one earnings announcement. All window rows of an event share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub infocode: InfoCode,
    pub fiscal_year: i32,
    pub quarter: Quarter,
    pub rdq: NaiveDate,
}

/// One firm × quarter earnings announcement (long form).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementEvent {
    pub infocode: InfoCode,
    pub fiscal_year: i32,
    pub quarter: Quarter,
    pub rdq: NaiveDate,
}

impl AnnouncementEvent {
    pub fn key(&self) -> EventKey {
        EventKey {
            infocode: self.infocode,
            fiscal_year: self.fiscal_year,
            quarter: self.quarter,
            rdq: self.rdq,
        }
    }

    /// Calendar year of the announcement (the sample's grouping year).
    pub fn year(&self) -> i32 {
        self.rdq.year()
    }
}

/// A candidate calendar date for one window offset. Exists only during matching.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub event: AnnouncementEvent,
    pub offset: i32,
    pub candidate: NaiveDate,
}

/// A candidate row resolved to a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchedRow {
    pub event: AnnouncementEvent,
    pub offset: i32,
    pub candidate: NaiveDate,
    pub date: NaiveDate,
    pub ret: f64,
    /// Calendar days between `candidate` and `date`.
    pub deviation_days: i64,
    /// Set once the zero-return shifter has moved this row.
    pub shifted: bool,
}

impl MatchedRow {
    pub fn key(&self) -> EventKey {
        self.event.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_labels_roundtrip() {
        for q in Quarter::ALL {
            assert_eq!(Quarter::parse(q.label()), Some(q));
        }
        assert_eq!(Quarter::parse("q3"), Some(Quarter::Q3));
        assert_eq!(Quarter::parse("Q5"), None);
    }

    #[test]
    fn event_year_follows_rdq() {
        let ev = AnnouncementEvent {
            infocode: InfoCode(1),
            fiscal_year: 2019,
            quarter: Quarter::Q4,
            rdq: NaiveDate::from_ymd_opt(2020, 2, 20).unwrap(),
        };
        assert_eq!(ev.year(), 2020);
        assert_eq!(ev.key().quarter, Quarter::Q4);
    }
}
