use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::InfoCode;

/// One trading day for one security.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradingObservation {
    pub infocode: InfoCode,
    pub date: NaiveDate,
    pub ret: f64,
}

impl TradingObservation {
    pub fn new(infocode: InfoCode, date: NaiveDate, ret: f64) -> Self {
        Self { infocode, date, ret }
    }

    /// A reported return of exactly zero is treated as a stale quote.
    pub fn is_zero_return(&self) -> bool {
        self.ret == 0.0
    }
}
