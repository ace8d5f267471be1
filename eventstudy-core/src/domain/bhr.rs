use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::event::Quarter;
use super::ids::InfoCode;

/// Three-day buy-and-hold return around one announcement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventBhr {
    pub infocode: InfoCode,
    pub fiscal_year: i32,
    pub year: i32,
    pub quarter: Quarter,
    pub rdq: NaiveDate,
    pub day_0: NaiveDate,
    pub bhr_3day: f64,
}

/// Calendar-year buy-and-hold return for one firm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualBhr {
    pub infocode: InfoCode,
    pub year: i32,
    pub bhr_annual: f64,
    pub trading_days: usize,
}
