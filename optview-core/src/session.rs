//! Dashboard session state: what the user picked and how it is shown.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::DataError;
use crate::domain::{DateRange, Expiration, OptionContract, OptionRight, Strike};
use crate::frame::DataField;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartKind {
    #[default]
    Line,
    Scatter,
    Candlestick,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [ChartKind::Line, ChartKind::Scatter, ChartKind::Candlestick];

    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Line => "Line",
            ChartKind::Scatter => "Scatter",
            ChartKind::Candlestick => "Candlestick",
        }
    }

    pub fn next(self) -> Self {
        match self {
            ChartKind::Line => ChartKind::Scatter,
            ChartKind::Scatter => ChartKind::Candlestick,
            ChartKind::Candlestick => ChartKind::Line,
        }
    }

    pub fn prev(self) -> Self {
        self.next().next()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayMode {
    #[default]
    Chart,
    Table,
}

impl DisplayMode {
    pub fn label(self) -> &'static str {
        match self {
            DisplayMode::Chart => "Chart",
            DisplayMode::Table => "Table",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            DisplayMode::Chart => DisplayMode::Table,
            DisplayMode::Table => DisplayMode::Chart,
        }
    }
}

/// Chart styles and the plotted option field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewFlags {
    pub stock_chart: ChartKind,
    pub option_chart: ChartKind,
    pub data_field: DataField,
}

/// Everything the sidebar selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selections {
    pub symbol: Option<String>,
    pub right: OptionRight,
    pub expiration: Option<Expiration>,
    /// Whether a second expiration is overlaid.
    pub add_more: bool,
    pub secondary_expiration: Option<Expiration>,
    pub strike: Option<Strike>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub display_mode: DisplayMode,
}

/// Contracts the dashboard fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionRequest {
    pub primary: OptionContract,
    pub secondary: Option<OptionContract>,
}

impl Selections {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: None,
            right: OptionRight::Put,
            expiration: None,
            add_more: false,
            secondary_expiration: None,
            strike: None,
            start,
            end,
            display_mode: DisplayMode::Chart,
        }
    }

    pub fn range(&self) -> Result<DateRange, DataError> {
        DateRange::new(self.start, self.end)
    }

    /// The secondary expiration, if the overlay is switched on.
    pub fn active_secondary(&self) -> Option<Expiration> {
        if self.add_more {
            self.secondary_expiration
        } else {
            None
        }
    }

    /// `None` until a symbol, expiration and strike are all picked.
    pub fn option_request(&self) -> Option<OptionRequest> {
        let symbol = self.symbol.as_deref()?;
        let expiration = self.expiration?;
        let strike = self.strike?;
        let primary = OptionContract::new(symbol, expiration, strike, self.right);
        let secondary = self
            .active_secondary()
            .map(|exp| OptionContract::new(symbol, exp, strike, self.right));
        Some(OptionRequest { primary, secondary })
    }

    /// Clear everything downstream of the symbol.
    pub fn reset_chain(&mut self) {
        self.expiration = None;
        self.secondary_expiration = None;
        self.strike = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn picked() -> Selections {
        let mut s = Selections::new(d(2023, 1, 1), d(2024, 6, 1));
        s.symbol = Some("AAPL".into());
        s.expiration = Some(Expiration(d(2024, 6, 21)));
        s.strike = Some(Strike(190_000));
        s.secondary_expiration = Some(Expiration(d(2024, 7, 19)));
        s
    }

    #[test]
    fn view_defaults() {
        let flags = ViewFlags::default();
        assert_eq!(flags.stock_chart, ChartKind::Line);
        assert_eq!(flags.option_chart, ChartKind::Line);
        assert_eq!(flags.data_field, DataField::Price);
        assert_eq!(Selections::new(d(2023, 1, 1), d(2024, 1, 1)).display_mode, DisplayMode::Chart);
    }

    #[test]
    fn chart_kind_cycles() {
        for kind in ChartKind::ALL {
            assert_eq!(kind.next().prev(), kind);
        }
        assert_eq!(ChartKind::Candlestick.next(), ChartKind::Line);
    }

    #[test]
    fn secondary_requires_add_more() {
        let mut s = picked();
        assert!(s.option_request().unwrap().secondary.is_none());
        s.add_more = true;
        let req = s.option_request().unwrap();
        assert_eq!(req.secondary.unwrap().expiration, Expiration(d(2024, 7, 19)));
        assert_eq!(req.primary.strike, Strike(190_000));
    }

    #[test]
    fn incomplete_selection_has_no_request() {
        let mut s = picked();
        s.strike = None;
        assert!(s.option_request().is_none());
    }

    #[test]
    fn inverted_range_is_invalid_input() {
        let mut s = picked();
        s.start = d(2025, 1, 1);
        assert!(matches!(s.range(), Err(DataError::InvalidInput(_))));
    }
}
