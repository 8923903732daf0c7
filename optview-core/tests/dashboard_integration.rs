//! End-to-end dashboard loads against in-memory providers, with and
//! without the parquet cache in between.

use std::sync::Arc;

use chrono::NaiveDate;
use optview_core::dashboard::{Dashboard, NO_DATA_MESSAGE, NO_OPTION_DATA_MESSAGE};
use optview_core::data::{
    CacheMode, CachedChain, CachedQuotes, DataError, InMemoryChain, InMemoryQuotes, ParquetCache,
};
use optview_core::domain::{Expiration, OptionContract, OptionEod, OptionRight, StockBar, Strike};
use optview_core::frame::DataField;
use optview_core::session::Selections;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn eod(date: NaiveDate, close: f64, volume: u64) -> OptionEod {
    OptionEod {
        date,
        open: close - 0.1,
        high: close + 0.2,
        low: close - 0.3,
        close,
        volume,
        count: volume / 4,
        bid: close - 0.05,
        ask: close + 0.05,
    }
}

fn bar(date: NaiveDate, close: f64) -> StockBar {
    StockBar {
        date,
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        adj_close: close,
        volume: 50_000_000,
    }
}

const STRIKE: Strike = Strike(470_000);

fn mar() -> Expiration {
    Expiration(d(2024, 3, 15))
}

fn apr() -> Expiration {
    Expiration(d(2024, 4, 19))
}

fn spy(exp: Expiration) -> OptionContract {
    OptionContract::new("SPY", exp, STRIKE, OptionRight::Call)
}

fn chain() -> InMemoryChain {
    InMemoryChain::new()
        .with_history(
            spy(mar()),
            vec![
                eod(d(2024, 1, 2), 9.8, 1200),
                eod(d(2024, 1, 3), 8.9, 950),
                eod(d(2024, 1, 4), 8.4, 1010),
            ],
        )
        .with_history(
            spy(apr()),
            vec![eod(d(2024, 1, 3), 12.1, 300), eod(d(2024, 1, 4), 11.6, 410)],
        )
        .with_root("XYZ")
}

fn quotes() -> InMemoryQuotes {
    InMemoryQuotes::new()
        .with_quotes(
            "SPY",
            Some("SPDR S&P 500 ETF Trust"),
            vec![bar(d(2024, 1, 2), 472.65), bar(d(2024, 1, 3), 468.79), bar(d(2024, 1, 4), 467.28)],
        )
        .with_quotes("XYZ", None, vec![])
}

fn selections(symbol: &str) -> Selections {
    let mut s = Selections::new(d(2024, 1, 1), d(2024, 1, 31));
    s.symbol = Some(symbol.into());
    s
}

fn spy_selections() -> Selections {
    let mut s = selections("SPY");
    s.expiration = Some(mar());
    s.strike = Some(STRIKE);
    s.right = OptionRight::Call;
    s
}

#[test]
fn symbol_without_options_gives_message_not_error() {
    use optview_core::data::OptionChainSource;

    // the terminal answers an empty listing with NoData
    assert!(chain().expirations("XYZ").unwrap_err().is_no_data());

    let db = Dashboard::new(Arc::new(chain()), Arc::new(quotes()));
    assert!(db.loader().list_expirations("XYZ").unwrap().is_empty());
    assert!(db.loader().list_strikes("XYZ", mar()).unwrap().is_empty());

    let data = db.load(&selections("XYZ")).unwrap();
    assert_eq!(data.messages, vec![NO_DATA_MESSAGE.to_string()]);
    assert_eq!(data.no_option_data(), Some(NO_OPTION_DATA_MESSAGE));
}

#[test]
fn combined_rows_equal_sum_of_fetches() {
    let db = Dashboard::new(Arc::new(chain()), Arc::new(quotes()));
    let mut s = spy_selections();
    s.add_more = true;
    s.secondary_expiration = Some(apr());

    let data = db.load(&s).unwrap();
    assert_eq!(data.history.len(), 3 + 2);
    assert_eq!(data.secondary_expiration, Some(apr()));
    assert_eq!(data.expirations_label().as_deref(), Some("2024-03-15 + 2024-04-19"));

    let pivot = data.history.pivot(DataField::Price);
    assert_eq!(pivot.column_labels(), vec!["2024-03-15", "2024-04-19"]);
    assert_eq!(pivot.index.len(), 3);
    assert_eq!(pivot.cells[0][1], None);
}

#[test]
fn secondary_alone_is_not_shown() {
    let db = Dashboard::new(Arc::new(chain()), Arc::new(quotes()));
    let mut s = spy_selections();
    s.expiration = Some(Expiration(d(2024, 5, 17)));
    s.add_more = true;
    s.secondary_expiration = Some(apr());

    let data = db.load(&s).unwrap();
    assert!(data.history.is_empty());
    assert!(data.primary_expiration.is_none());
    assert!(data.secondary_expiration.is_none());
    assert_eq!(data.messages, vec![NO_DATA_MESSAGE.to_string()]);
}

#[test]
fn empty_quotes_show_zero_price() {
    let db = Dashboard::new(Arc::new(chain()), Arc::new(quotes()));
    let data = db.load(&selections("XYZ")).unwrap();
    assert_eq!(data.headline(), "Symbol: XYZ - XYZ - Latest Price: 0.00");
}

#[test]
fn cached_stack_serves_second_load_offline() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(ParquetCache::new(dir.path()));

    let live = Dashboard::new(
        Arc::new(CachedChain::new(chain(), Arc::clone(&cache), CacheMode::ReadWrite)),
        Arc::new(CachedQuotes::new(quotes(), Arc::clone(&cache), CacheMode::ReadWrite)),
    );
    let first = live.load(&spy_selections()).unwrap();

    let offline = Dashboard::new(
        Arc::new(CachedChain::new(InMemoryChain::new(), Arc::clone(&cache), CacheMode::Offline)),
        Arc::new(CachedQuotes::new(InMemoryQuotes::new(), Arc::clone(&cache), CacheMode::Offline)),
    );
    assert_eq!(offline.loader().list_symbols().unwrap(), vec!["SPY".to_string()]);
    assert_eq!(offline.loader().list_expirations("SPY").unwrap(), vec![mar()]);
    assert_eq!(offline.loader().list_strikes("SPY", mar()).unwrap(), vec![STRIKE]);

    let second = offline.load(&spy_selections()).unwrap();
    assert_eq!(second.history, first.history);
    assert_eq!(second.headline(), first.headline());
}

#[test]
fn offline_stock_miss_gives_empty_quotes() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(ParquetCache::new(dir.path()));
    let offline = Dashboard::new(
        Arc::new(CachedChain::new(chain(), Arc::clone(&cache), CacheMode::Offline)),
        Arc::new(CachedQuotes::new(quotes(), cache, CacheMode::Offline)),
    );
    let data = offline.load(&spy_selections()).unwrap();
    assert!(data.quotes.is_empty());
    assert_eq!(data.messages, vec![NO_DATA_MESSAGE.to_string()]);
    assert_eq!(data.headline(), "Symbol: SPY - SPY - Latest Price: 0.00");
}

#[test]
fn offline_next_day_serves_what_was_cached() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(ParquetCache::new(dir.path()));

    let live = Dashboard::new(
        Arc::new(CachedChain::new(chain(), Arc::clone(&cache), CacheMode::ReadWrite)),
        Arc::new(CachedQuotes::new(quotes(), Arc::clone(&cache), CacheMode::ReadWrite)),
    );
    let first = live.load(&spy_selections()).unwrap();

    // a day later the end date has moved past the cached range
    let mut next_day = spy_selections();
    next_day.end = d(2024, 2, 1);
    let offline = Dashboard::new(
        Arc::new(CachedChain::new(InMemoryChain::new(), Arc::clone(&cache), CacheMode::Offline)),
        Arc::new(CachedQuotes::new(InMemoryQuotes::new(), Arc::clone(&cache), CacheMode::Offline)),
    );
    let data = offline.load(&next_day).unwrap();
    assert!(data.messages.is_empty());
    assert_eq!(data.history, first.history);
    assert_eq!(data.quotes.bars, first.quotes.bars);
    assert_eq!(data.headline(), first.headline());
}

#[test]
fn stock_network_errors_still_propagate() {
    let quotes = InMemoryQuotes::new().with_failure("SPY", || DataError::NetworkUnreachable("down".into()));
    let db = Dashboard::new(Arc::new(chain()), Arc::new(quotes));
    let err = db.load(&spy_selections()).unwrap_err();
    assert!(matches!(err, DataError::NetworkUnreachable(_)));
}
