use serde::{Deserialize, Serialize};
use std::fmt;

/// Datastream security identifier (`infocode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InfoCode(pub i64);

impl InfoCode {
    /// Parse an identifier cell. Accepts integer text and integral floats
    /// ("1234.0"), which is what spreadsheet-style exports produce for
    /// nullable integer columns.
    pub fn parse(raw: &str) -> Option<Self> {
        parse_integral(raw).map(Self)
    }
}

impl fmt::Display for InfoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Worldscope company identifier (`code`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WsCode(pub i64);

impl WsCode {
    pub fn parse(raw: &str) -> Option<Self> {
        parse_integral(raw).map(Self)
    }
}

impl fmt::Display for WsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn parse_integral(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    let f = trimmed.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
