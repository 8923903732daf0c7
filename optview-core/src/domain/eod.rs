//! OptionEod: end-of-day record for a single option contract.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of an option contract.
///
/// OHLC come from trades and are zero on days the contract did not trade;
/// `bid`/`ask` are the closing quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionEod {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub count: u64,
    pub bid: f64,
    pub ask: f64,
}
