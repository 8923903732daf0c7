//! Option contract identity: right, expiration, strike, and the date range
//! a history request covers.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::data::DataError;

/// Put or call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    /// Single-letter form used on the wire and in cache paths.
    pub fn letter(self) -> char {
        match self {
            OptionRight::Call => 'C',
            OptionRight::Put => 'P',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OptionRight::Call => "CALL",
            OptionRight::Put => "PUT",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            OptionRight::Call => OptionRight::Put,
            OptionRight::Put => OptionRight::Call,
        }
    }
}

impl fmt::Display for OptionRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OptionRight {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "C" | "CALL" => Ok(OptionRight::Call),
            "P" | "PUT" => Ok(OptionRight::Put),
            other => Err(DataError::InvalidInput(format!(
                "unknown option right '{other}' (expected CALL or PUT)"
            ))),
        }
    }
}

/// Contract expiration date.
///
/// The terminal encodes dates as `YYYYMMDD` integers; the dashboard labels
/// them `YYYY-MM-DD`, and that label is what histories are pivoted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Expiration(pub NaiveDate);

impl Expiration {
    pub fn date(self) -> NaiveDate {
        self.0
    }

    pub fn label(self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    pub fn to_wire(self) -> u32 {
        date_to_wire(self.0)
    }

    pub fn from_wire(value: u32) -> Result<Self, DataError> {
        date_from_wire(value).map(Expiration)
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for Expiration {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_date(s).map(Expiration)
    }
}

/// Strike price in tenths of a cent, the terminal's native unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Strike(pub u32);

impl Strike {
    const PER_DOLLAR: f64 = 1000.0;

    pub fn from_dollars(dollars: f64) -> Result<Self, DataError> {
        if !dollars.is_finite() || dollars <= 0.0 {
            return Err(DataError::InvalidInput(format!(
                "strike must be a positive price, got {dollars}"
            )));
        }
        let raw = (dollars * Self::PER_DOLLAR).round();
        if raw > u32::MAX as f64 {
            return Err(DataError::InvalidInput(format!("strike {dollars} out of range")));
        }
        Ok(Strike(raw as u32))
    }

    pub fn dollars(self) -> f64 {
        self.0 as f64 / Self::PER_DOLLAR
    }
}

impl fmt::Display for Strike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.dollars())
    }
}

impl FromStr for Strike {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('$');
        let dollars: f64 = trimmed
            .parse()
            .map_err(|_| DataError::InvalidInput(format!("invalid strike '{s}'")))?;
        Strike::from_dollars(dollars)
    }
}

/// A fully specified option contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionContract {
    pub root: String,
    pub expiration: Expiration,
    pub strike: Strike,
    pub right: OptionRight,
}

impl OptionContract {
    pub fn new(root: impl Into<String>, expiration: Expiration, strike: Strike, right: OptionRight) -> Self {
        Self {
            root: root.into(),
            expiration,
            strike,
            right,
        }
    }
}

impl fmt::Display for OptionContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.root, self.expiration, self.strike, self.right
        )
    }
}

/// Inclusive calendar range for history requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DataError> {
        if start > end {
            return Err(DataError::InvalidInput(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// True if `self` lies entirely inside `other`.
    pub fn within(&self, other: &DateRange) -> bool {
        self.start >= other.start && self.end <= other.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// `YYYYMMDD` integer form of a date.
pub fn date_to_wire(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

pub fn date_from_wire(value: u32) -> Result<NaiveDate, DataError> {
    let year = (value / 10_000) as i32;
    let month = (value / 100) % 100;
    let day = value % 100;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid wire date {value}")))
}

/// Parse `YYYY-MM-DD` (or the compact `YYYYMMDD`).
pub fn parse_date(s: &str) -> Result<NaiveDate, DataError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .map_err(|_| DataError::InvalidInput(format!("invalid date '{s}' (expected YYYY-MM-DD)")))
}
