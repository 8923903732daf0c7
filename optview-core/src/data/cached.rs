//! Cache-backed provider wrappers.
//!
//! `CachedChain` and `CachedQuotes` implement the provider traits over a
//! live provider plus the parquet cache. A request the cache fully covers is
//! served from disk; otherwise the live provider is asked for the union of
//! the cached and requested ranges and the result is written through. In
//! offline mode the live provider is never called and whatever part of the
//! request the cache holds is served.

use std::sync::Arc;

use tracing::{debug, warn};

use super::cache::{CoverageResult, ParquetCache};
use super::provider::{DataError, DataSource, OptionChainSource, QuoteDownload, QuoteSource};
use crate::domain::{DateRange, Expiration, OptionContract, OptionEod, Strike};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Read hits from disk, fetch misses live and write them through.
    ReadWrite,
    /// Serve only from disk.
    Offline,
}

/// Range to fetch on a miss: widen to keep what the cache already holds.
fn fetch_range(coverage: &CoverageResult, requested: DateRange) -> DateRange {
    match coverage {
        CoverageResult::PartiallyCovered {
            cached_start,
            cached_end,
        } => DateRange::new(
            (*cached_start).min(requested.start()),
            (*cached_end).max(requested.end()),
        )
        .unwrap_or(requested),
        _ => requested,
    }
}

pub struct CachedChain<S> {
    inner: S,
    cache: Arc<ParquetCache>,
    mode: CacheMode,
}

impl<S: OptionChainSource> CachedChain<S> {
    pub fn new(inner: S, cache: Arc<ParquetCache>, mode: CacheMode) -> Self {
        Self { inner, cache, mode }
    }

    fn offline(&self) -> bool {
        self.mode == CacheMode::Offline
    }
}

impl<S: OptionChainSource> OptionChainSource for CachedChain<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn roots(&self) -> Result<Vec<String>, DataError> {
        if self.offline() {
            return Ok(self.cache.cached_roots());
        }
        self.inner.roots()
    }

    fn expirations(&self, root: &str) -> Result<Vec<Expiration>, DataError> {
        if self.offline() {
            return Ok(self.cache.cached_expirations(root));
        }
        self.inner.expirations(root)
    }

    fn strikes(&self, root: &str, expiration: Expiration) -> Result<Vec<Strike>, DataError> {
        if self.offline() {
            return Ok(self.cache.cached_strikes(root, expiration));
        }
        self.inner.strikes(root, expiration)
    }

    fn hist_option_eod(
        &self,
        contract: &OptionContract,
        range: DateRange,
    ) -> Result<Vec<OptionEod>, DataError> {
        match self.cache.read_option(contract, range) {
            Ok(Some(rows)) if !rows.is_empty() => {
                debug!(%contract, rows = rows.len(), "option cache hit");
                return Ok(rows);
            }
            Ok(Some(_)) => {
                return Err(DataError::NoData(format!("{contract} has no rows in {range}")));
            }
            Ok(None) => {}
            Err(e) => warn!(%contract, error = %e, "option cache read failed"),
        }

        if self.offline() {
            return match self.cache.read_option_overlap(contract, range) {
                Ok(Some(rows)) if !rows.is_empty() => {
                    debug!(%contract, rows = rows.len(), "partial option cache hit");
                    Ok(rows)
                }
                Ok(Some(_)) => Err(DataError::NoData(format!("{contract} has no rows in {range}"))),
                _ => Err(DataError::NoCachedData {
                    key: contract.to_string(),
                }),
            };
        }

        let coverage = self.cache.option_coverage(contract, range);
        let wide = fetch_range(&coverage, range);
        let rows = self.inner.hist_option_eod(contract, wide)?;
        if let Err(e) = self.cache.write_option(contract, wide, &rows) {
            warn!(%contract, error = %e, "option cache write failed");
        }

        let rows: Vec<OptionEod> = rows.into_iter().filter(|r| range.contains(r.date)).collect();
        if rows.is_empty() {
            return Err(DataError::NoData(format!("{contract} has no rows in {range}")));
        }
        Ok(rows)
    }
}

pub struct CachedQuotes<S> {
    inner: S,
    cache: Arc<ParquetCache>,
    mode: CacheMode,
}

impl<S: QuoteSource> CachedQuotes<S> {
    pub fn new(inner: S, cache: Arc<ParquetCache>, mode: CacheMode) -> Self {
        Self { inner, cache, mode }
    }
}

impl<S: QuoteSource> QuoteSource for CachedQuotes<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn download(&self, symbol: &str, range: DateRange) -> Result<QuoteDownload, DataError> {
        match self.cache.read_stock(symbol, range) {
            Ok(Some((long_name, bars))) => {
                debug!(symbol, bars = bars.len(), "stock cache hit");
                // cached ranges are stored inclusive; the download contract is end-exclusive
                let bars = bars.into_iter().filter(|b| b.date < range.end()).collect();
                return Ok(QuoteDownload {
                    symbol: symbol.to_string(),
                    long_name,
                    bars,
                    source: DataSource::Cache,
                });
            }
            Ok(None) => {}
            Err(e) => warn!(symbol, error = %e, "stock cache read failed"),
        }

        if self.mode == CacheMode::Offline {
            return match self.cache.read_stock_overlap(symbol, range) {
                Ok(Some((long_name, bars))) => {
                    debug!(symbol, bars = bars.len(), "partial stock cache hit");
                    Ok(QuoteDownload {
                        symbol: symbol.to_string(),
                        long_name,
                        bars: bars.into_iter().filter(|b| b.date < range.end()).collect(),
                        source: DataSource::Cache,
                    })
                }
                _ => Err(DataError::NoCachedData {
                    key: symbol.to_string(),
                }),
            };
        }

        let coverage = self.cache.stock_coverage(symbol, range);
        let wide = fetch_range(&coverage, range);
        let mut download = self.inner.download(symbol, wide)?;
        if let Err(e) =
            self.cache
                .write_stock(symbol, wide, download.long_name.as_deref(), &download.bars)
        {
            warn!(symbol, error = %e, "stock cache write failed");
        }

        download
            .bars
            .retain(|b| b.date >= range.start() && b.date < range.end());
        Ok(download)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::{InMemoryChain, InMemoryQuotes};
    use crate::domain::{OptionRight, StockBar};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange::new(start, end).unwrap()
    }

    fn contract() -> OptionContract {
        OptionContract::new("AAPL", Expiration(d(2024, 6, 21)), Strike(190_000), OptionRight::Call)
    }

    fn eod(date: NaiveDate, close: f64) -> OptionEod {
        OptionEod {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 10,
            count: 2,
            bid: close - 0.05,
            ask: close + 0.05,
        }
    }

    fn bar(date: NaiveDate, close: f64) -> StockBar {
        StockBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            adj_close: close,
            volume: 1_000,
        }
    }

    #[test]
    fn second_request_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ParquetCache::new(dir.path()));
        let inner = Arc::new(InMemoryChain::new().with_history(
            contract(),
            vec![eod(d(2024, 1, 2), 5.0), eod(d(2024, 1, 3), 5.5)],
        ));
        let cached = CachedChain::new(Arc::clone(&inner), cache, CacheMode::ReadWrite);
        let r = range(d(2024, 1, 1), d(2024, 1, 31));

        assert_eq!(cached.hist_option_eod(&contract(), r).unwrap().len(), 2);
        assert_eq!(cached.hist_option_eod(&contract(), r).unwrap().len(), 2);
        assert_eq!(inner.history_calls(), 1);
    }

    #[test]
    fn no_data_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ParquetCache::new(dir.path()));
        let inner = Arc::new(InMemoryChain::new().with_root("AAPL"));
        let cached = CachedChain::new(Arc::clone(&inner), cache, CacheMode::ReadWrite);
        let r = range(d(2024, 1, 1), d(2024, 1, 31));

        assert!(cached.hist_option_eod(&contract(), r).unwrap_err().is_no_data());
        assert!(cached.hist_option_eod(&contract(), r).unwrap_err().is_no_data());
        assert_eq!(inner.history_calls(), 2);
    }

    #[test]
    fn offline_miss_is_no_cached_data() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ParquetCache::new(dir.path()));
        let inner = Arc::new(InMemoryChain::new().with_history(contract(), vec![eod(d(2024, 1, 2), 5.0)]));
        let cached = CachedChain::new(Arc::clone(&inner), cache, CacheMode::Offline);

        let err = cached
            .hist_option_eod(&contract(), range(d(2024, 1, 1), d(2024, 1, 31)))
            .unwrap_err();
        assert!(matches!(err, DataError::NoCachedData { .. }));
        assert_eq!(inner.history_calls(), 0);
        assert!(cached.roots().unwrap().is_empty());
    }

    #[test]
    fn partial_coverage_fetches_the_union() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ParquetCache::new(dir.path()));
        let inner = Arc::new(InMemoryChain::new().with_history(
            contract(),
            vec![eod(d(2024, 1, 2), 5.0), eod(d(2024, 2, 1), 6.0)],
        ));
        let cached = CachedChain::new(Arc::clone(&inner), Arc::clone(&cache), CacheMode::ReadWrite);

        cached
            .hist_option_eod(&contract(), range(d(2024, 1, 1), d(2024, 1, 15)))
            .unwrap();
        let feb = cached
            .hist_option_eod(&contract(), range(d(2024, 1, 20), d(2024, 2, 10)))
            .unwrap();
        assert_eq!(feb.len(), 1);
        assert_eq!(
            cache.option_coverage(&contract(), range(d(2024, 1, 1), d(2024, 2, 10))),
            CoverageResult::FullyCovered
        );
    }

    #[test]
    fn quotes_write_through_and_keep_long_name() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ParquetCache::new(dir.path()));
        let inner = Arc::new(InMemoryQuotes::new().with_quotes(
            "AAPL",
            Some("Apple Inc."),
            vec![bar(d(2024, 1, 2), 185.6), bar(d(2024, 1, 3), 184.3)],
        ));
        let cached = CachedQuotes::new(Arc::clone(&inner), cache, CacheMode::ReadWrite);
        let r = range(d(2024, 1, 1), d(2024, 1, 3));

        let live = cached.download("AAPL", r).unwrap();
        let hit = cached.download("AAPL", r).unwrap();
        assert_eq!(inner.download_calls(), 1);
        assert_eq!(hit.source, DataSource::Cache);
        assert_eq!(hit.long_name.as_deref(), Some("Apple Inc."));
        // end-exclusive on both paths
        assert_eq!(live.bars.len(), 1);
        assert_eq!(hit.bars, live.bars);
    }
}
