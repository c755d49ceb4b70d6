//! Shared primitive types used across the whole calculator.

use crate::error::{CalcError, CalcResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A segment name as it appears in the records ("Móvel", "Residencial").
pub type Segment = String;

/// A subchannel name as it appears in the records.
pub type Subchannel = String;

/// A tribe (delivery channel) name: "App", "Bot", "Web", "Dma", ...
pub type Tribe = String;

/// Tribe assigned to an entity whose records never name one.
pub const UNDEFINED_TRIBE: &str = "Undefined";

/// A calendar month. Ordered chronologically.
///
/// Parses from `YYYYMM` (the upstream sheet format) or `YYYY-MM`,
/// and always serializes as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year:  i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> CalcResult<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|d| Self { year: d.year(), month: d.month() })
            .ok_or_else(|| CalcError::InvalidPeriod { raw: format!("{year}-{month}") })
    }

    pub fn parse(raw: &str) -> CalcResult<Self> {
        let trimmed = raw.trim();
        let compact: String = trimmed.chars().filter(|c| *c != '-' && *c != '/').collect();
        // Accept a trailing day ("20240115") or a float-ish sheet cell ("202401.0").
        let compact = compact.split('.').next().unwrap_or_default();
        let head = compact.get(..6).unwrap_or(compact);
        NaiveDate::parse_from_str(&format!("{head}01"), "%Y%m%d")
            .map(|d| Self { year: d.year(), month: d.month() })
            .map_err(|_| CalcError::InvalidPeriod { raw: raw.to_string() })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl TryFrom<String> for Period {
    type Error = CalcError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Period::parse(&raw)
    }
}

impl From<Period> for String {
    fn from(p: Period) -> Self {
        p.to_string()
    }
}
