//! Domain types: contracts, quote rows, date ranges.

pub mod bar;
pub mod contract;
pub mod eod;

pub use bar::StockBar;
pub use contract::{
    date_from_wire, date_to_wire, parse_date, DateRange, Expiration, OptionContract, OptionRight,
    Strike,
};
pub use eod::OptionEod;

