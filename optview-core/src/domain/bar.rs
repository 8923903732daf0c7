//! StockBar: one daily quote row from the stock downloader.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV quote for the underlying.
///
/// Prices are as reported; `adj_close` is kept for the table view but the
/// charts plot raw `close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

impl StockBar {
    /// Returns true if any price field is NaN (provider gap).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// high >= low and both bracket open/close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}
