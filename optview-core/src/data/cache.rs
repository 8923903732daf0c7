//! Parquet cache for option histories and stock quotes.
//!
//! Layout:
//! - `{cache_dir}/options/root={ROOT}/exp={YYYYMMDD}/{C|P}_{strike}.parquet`
//! - `{cache_dir}/stocks/symbol={SYMBOL}.parquet`
//!
//! Each parquet file has a `.meta.json` sidecar recording the date range the
//! fetch covered, so a later request inside that range is served without
//! touching the network. Writes are atomic (tmp then rename) and files that
//! fail to load are quarantined.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::provider::DataError;
use crate::domain::{DateRange, Expiration, OptionContract, OptionEod, StockBar, Strike};

/// Sidecar describing one cached file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub key: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rows: usize,
    #[serde(default)]
    pub long_name: Option<String>,
    pub cached_at: chrono::NaiveDateTime,
}

impl CacheMeta {
    pub fn range(&self) -> Option<DateRange> {
        DateRange::new(self.start_date, self.end_date).ok()
    }
}

/// How well a cached entry covers a request.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn options_dir(&self) -> PathBuf {
        self.cache_dir.join("options")
    }

    fn root_dir(&self, root: &str) -> PathBuf {
        self.options_dir().join(format!("root={root}"))
    }

    fn exp_dir(&self, root: &str, exp: Expiration) -> PathBuf {
        self.root_dir(root).join(format!("exp={}", exp.to_wire()))
    }

    fn option_path(&self, contract: &OptionContract) -> PathBuf {
        self.exp_dir(&contract.root, contract.expiration).join(format!(
            "{}_{}.parquet",
            contract.right.letter(),
            contract.strike.0
        ))
    }

    fn stock_path(&self, symbol: &str) -> PathBuf {
        self.cache_dir
            .join("stocks")
            .join(format!("symbol={symbol}.parquet"))
    }

    // ── option histories ────────────────────────────────────────────

    pub fn write_option(
        &self,
        contract: &OptionContract,
        range: DateRange,
        rows: &[OptionEod],
    ) -> Result<(), DataError> {
        let df = eod_to_dataframe(rows)?;
        let path = self.option_path(contract);
        write_with_meta(&path, &df, range, rows.len(), None, &contract.to_string())
    }

    /// Cached rows inside `range`, if the cached entry covers it.
    pub fn read_option(
        &self,
        contract: &OptionContract,
        range: DateRange,
    ) -> Result<Option<Vec<OptionEod>>, DataError> {
        self.read_option_rows(contract, range, false)
    }

    /// Cached rows inside `range` from whatever part of it the cached entry
    /// holds. `None` only when nothing cached overlaps the range.
    pub fn read_option_overlap(
        &self,
        contract: &OptionContract,
        range: DateRange,
    ) -> Result<Option<Vec<OptionEod>>, DataError> {
        self.read_option_rows(contract, range, true)
    }

    fn read_option_rows(
        &self,
        contract: &OptionContract,
        range: DateRange,
        partial: bool,
    ) -> Result<Option<Vec<OptionEod>>, DataError> {
        let path = self.option_path(contract);
        if !servable(&path, range, partial) {
            return Ok(None);
        }
        let Some(df) = load_or_quarantine(&path)? else {
            return Ok(None);
        };
        let rows = dataframe_to_eod(&df)?
            .into_iter()
            .filter(|r| range.contains(r.date))
            .collect();
        Ok(Some(rows))
    }

    pub fn option_coverage(&self, contract: &OptionContract, range: DateRange) -> CoverageResult {
        coverage(&self.option_path(contract), range)
    }

    // ── stock quotes ────────────────────────────────────────────────

    pub fn write_stock(
        &self,
        symbol: &str,
        range: DateRange,
        long_name: Option<&str>,
        bars: &[StockBar],
    ) -> Result<(), DataError> {
        let df = bars_to_dataframe(bars)?;
        let path = self.stock_path(symbol);
        write_with_meta(&path, &df, range, bars.len(), long_name, symbol)
    }

    /// Cached bars inside `range` and the cached long name, if the cached
    /// entry covers it.
    pub fn read_stock(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<Option<(Option<String>, Vec<StockBar>)>, DataError> {
        self.read_stock_bars(symbol, range, false)
    }

    /// Like `read_stock`, but serves any overlap with the cached range.
    pub fn read_stock_overlap(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<Option<(Option<String>, Vec<StockBar>)>, DataError> {
        self.read_stock_bars(symbol, range, true)
    }

    fn read_stock_bars(
        &self,
        symbol: &str,
        range: DateRange,
        partial: bool,
    ) -> Result<Option<(Option<String>, Vec<StockBar>)>, DataError> {
        let path = self.stock_path(symbol);
        let Some(meta) = read_meta(&path) else {
            return Ok(None);
        };
        if !servable(&path, range, partial) {
            return Ok(None);
        }
        let bars = match load_or_quarantine(&path)? {
            Some(df) => dataframe_to_bars(&df)?,
            // an empty download is cached as meta only
            None if meta.rows == 0 => Vec::new(),
            None => return Ok(None),
        };
        let bars = bars.into_iter().filter(|b| range.contains(b.date)).collect();
        Ok(Some((meta.long_name, bars)))
    }

    pub fn stock_coverage(&self, symbol: &str, range: DateRange) -> CoverageResult {
        coverage(&self.stock_path(symbol), range)
    }

    // ── offline chain listing ───────────────────────────────────────

    /// Roots with at least one cached contract.
    pub fn cached_roots(&self) -> Vec<String> {
        list_prefixed(&self.options_dir(), "root=")
    }

    pub fn cached_expirations(&self, root: &str) -> Vec<Expiration> {
        let mut exps: Vec<Expiration> = list_prefixed(&self.root_dir(root), "exp=")
            .into_iter()
            .filter_map(|s| s.parse::<u32>().ok())
            .filter_map(|w| Expiration::from_wire(w).ok())
            .collect();
        exps.sort();
        exps
    }

    pub fn cached_strikes(&self, root: &str, exp: Expiration) -> Vec<Strike> {
        let Ok(entries) = fs::read_dir(self.exp_dir(root, exp)) else {
            return Vec::new();
        };
        let mut strikes: Vec<Strike> = entries
            .flatten()
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                let stem = name.strip_suffix(".parquet")?;
                let (_, strike) = stem.split_once('_')?;
                strike.parse::<u32>().ok().map(Strike)
            })
            .collect();
        strikes.sort();
        strikes.dedup();
        strikes
    }
}

fn meta_path(path: &Path) -> PathBuf {
    path.with_extension("meta.json")
}

fn read_meta(path: &Path) -> Option<CacheMeta> {
    let content = fs::read_to_string(meta_path(path)).ok()?;
    serde_json::from_str(&content).ok()
}

fn coverage(path: &Path, range: DateRange) -> CoverageResult {
    match read_meta(path) {
        None => CoverageResult::NotCached,
        Some(meta) => match meta.range() {
            Some(cached) if range.within(&cached) => CoverageResult::FullyCovered,
            _ => CoverageResult::PartiallyCovered {
                cached_start: meta.start_date,
                cached_end: meta.end_date,
            },
        },
    }
}

/// The cached entry answers `range`: fully, or with any overlap when
/// `partial` is set.
fn servable(path: &Path, range: DateRange, partial: bool) -> bool {
    match read_meta(path).and_then(|m| m.range()) {
        Some(cached) => range.within(&cached) || (partial && cached.overlaps(&range)),
        None => false,
    }
}

fn list_prefixed(dir: &Path, prefix: &str) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            e.file_name()
                .to_string_lossy()
                .strip_prefix(prefix)
                .map(str::to_string)
        })
        .collect();
    names.sort();
    names
}

fn write_with_meta(
    path: &Path,
    df: &DataFrame,
    range: DateRange,
    rows: usize,
    long_name: Option<&str>,
    key: &str,
) -> Result<(), DataError> {
    let dir = path
        .parent()
        .ok_or_else(|| DataError::Cache(format!("no parent for {}", path.display())))?;
    fs::create_dir_all(dir).map_err(|e| DataError::Cache(format!("failed to create dir: {e}")))?;

    if rows > 0 {
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(df, &tmp_path)?;
        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Cache(format!("atomic rename failed: {e}"))
        })?;
    } else if path.exists() {
        // stale data from an earlier, wider fetch
        let _ = fs::remove_file(path);
    }

    let meta = CacheMeta {
        key: key.to_string(),
        start_date: range.start(),
        end_date: range.end(),
        rows,
        long_name: long_name.map(str::to_string),
        cached_at: chrono::Local::now().naive_local(),
    };
    let json = serde_json::to_string_pretty(&meta)
        .map_err(|e| DataError::Cache(format!("meta serialization: {e}")))?;
    let meta_tmp = meta_path(path).with_extension("json.tmp");
    fs::write(&meta_tmp, json).map_err(|e| DataError::Cache(format!("write meta: {e}")))?;
    fs::rename(&meta_tmp, meta_path(path))
        .map_err(|e| DataError::Cache(format!("atomic rename failed: {e}")))?;

    debug!(key, rows, %range, "cached");
    Ok(())
}

/// Load a parquet file; on failure move it (and its sidecar) aside.
fn load_or_quarantine(path: &Path) -> Result<Option<DataFrame>, DataError> {
    if !path.exists() {
        return Ok(None);
    }
    match read_parquet(path) {
        Ok(df) => Ok(Some(df)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
            let _ = fs::rename(path, path.with_extension("parquet.quarantined"));
            let _ = fs::remove_file(meta_path(path));
            Ok(None)
        }
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

fn date_column(dates: Vec<i32>) -> Result<Column, DataError> {
    Column::new("date".into(), dates)
        .cast(&DataType::Date)
        .map_err(|e| DataError::Cache(format!("date cast: {e}")))
}

fn eod_to_dataframe(rows: &[OptionEod]) -> Result<DataFrame, DataError> {
    DataFrame::new(vec![
        date_column(rows.iter().map(|r| days_since_epoch(r.date)).collect())?,
        Column::new("open".into(), rows.iter().map(|r| r.open).collect::<Vec<f64>>()),
        Column::new("high".into(), rows.iter().map(|r| r.high).collect::<Vec<f64>>()),
        Column::new("low".into(), rows.iter().map(|r| r.low).collect::<Vec<f64>>()),
        Column::new("close".into(), rows.iter().map(|r| r.close).collect::<Vec<f64>>()),
        Column::new("volume".into(), rows.iter().map(|r| r.volume).collect::<Vec<u64>>()),
        Column::new("count".into(), rows.iter().map(|r| r.count).collect::<Vec<u64>>()),
        Column::new("bid".into(), rows.iter().map(|r| r.bid).collect::<Vec<f64>>()),
        Column::new("ask".into(), rows.iter().map(|r| r.ask).collect::<Vec<f64>>()),
    ])
    .map_err(|e| DataError::Cache(format!("dataframe creation: {e}")))
}

fn bars_to_dataframe(bars: &[StockBar]) -> Result<DataFrame, DataError> {
    DataFrame::new(vec![
        date_column(bars.iter().map(|b| days_since_epoch(b.date)).collect())?,
        Column::new("open".into(), bars.iter().map(|b| b.open).collect::<Vec<f64>>()),
        Column::new("high".into(), bars.iter().map(|b| b.high).collect::<Vec<f64>>()),
        Column::new("low".into(), bars.iter().map(|b| b.low).collect::<Vec<f64>>()),
        Column::new("close".into(), bars.iter().map(|b| b.close).collect::<Vec<f64>>()),
        Column::new("adj_close".into(), bars.iter().map(|b| b.adj_close).collect::<Vec<f64>>()),
        Column::new("volume".into(), bars.iter().map(|b| b.volume).collect::<Vec<u64>>()),
    ])
    .map_err(|e| DataError::Cache(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file = fs::File::create(path).map_err(|e| DataError::Cache(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::Cache(format!("write parquet: {e}")))?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<DataFrame, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::Cache(format!("open: {e}")))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::Cache(format!("read: {e}")))
}

/// Typed column accessors shared by both row conversions.
struct Columns<'a> {
    df: &'a DataFrame,
}

impl<'a> Columns<'a> {
    fn f64(&self, name: &str) -> Result<&'a Float64Chunked, DataError> {
        self.df
            .column(name)
            .and_then(|c| c.f64())
            .map_err(|e| DataError::Cache(format!("column '{name}': {e}")))
    }

    fn u64(&self, name: &str) -> Result<&'a UInt64Chunked, DataError> {
        self.df
            .column(name)
            .and_then(|c| c.u64())
            .map_err(|e| DataError::Cache(format!("column '{name}': {e}")))
    }

    fn dates(&self) -> Result<Vec<NaiveDate>, DataError> {
        let ca = self
            .df
            .column("date")
            .and_then(|c| c.date())
            .map_err(|e| DataError::Cache(format!("column 'date': {e}")))?;
        (0..self.df.height())
            .map(|i| {
                ca.get(i)
                    .map(|days| epoch() + chrono::Duration::days(days as i64))
                    .ok_or_else(|| DataError::Cache(format!("null date at row {i}")))
            })
            .collect()
    }
}

fn dataframe_to_eod(df: &DataFrame) -> Result<Vec<OptionEod>, DataError> {
    let cols = Columns { df };
    let dates = cols.dates()?;
    let (open, high, low, close) = (cols.f64("open")?, cols.f64("high")?, cols.f64("low")?, cols.f64("close")?);
    let (volume, count) = (cols.u64("volume")?, cols.u64("count")?);
    let (bid, ask) = (cols.f64("bid")?, cols.f64("ask")?);

    Ok(dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| OptionEod {
            date,
            open: open.get(i).unwrap_or(0.0),
            high: high.get(i).unwrap_or(0.0),
            low: low.get(i).unwrap_or(0.0),
            close: close.get(i).unwrap_or(0.0),
            volume: volume.get(i).unwrap_or(0),
            count: count.get(i).unwrap_or(0),
            bid: bid.get(i).unwrap_or(0.0),
            ask: ask.get(i).unwrap_or(0.0),
        })
        .collect())
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<StockBar>, DataError> {
    let cols = Columns { df };
    let dates = cols.dates()?;
    let (open, high, low, close) = (cols.f64("open")?, cols.f64("high")?, cols.f64("low")?, cols.f64("close")?);
    let adj_close = cols.f64("adj_close")?;
    let volume = cols.u64("volume")?;

    Ok(dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| StockBar {
            date,
            open: open.get(i).unwrap_or(f64::NAN),
            high: high.get(i).unwrap_or(f64::NAN),
            low: low.get(i).unwrap_or(f64::NAN),
            close: close.get(i).unwrap_or(f64::NAN),
            adj_close: adj_close.get(i).unwrap_or(f64::NAN),
            volume: volume.get(i).unwrap_or(0),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OptionRight;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn contract() -> OptionContract {
        OptionContract::new("SPY", Expiration(d(2024, 3, 15)), Strike(480_000), OptionRight::Put)
    }

    fn eod_rows() -> Vec<OptionEod> {
        vec![
            OptionEod {
                date: d(2024, 1, 2),
                open: 12.1,
                high: 12.9,
                low: 11.8,
                close: 12.4,
                volume: 310,
                count: 41,
                bid: 12.3,
                ask: 12.5,
            },
            OptionEod {
                date: d(2024, 1, 3),
                open: 12.6,
                high: 13.8,
                low: 12.5,
                close: 13.6,
                volume: 522,
                count: 64,
                bid: 13.5,
                ask: 13.7,
            },
        ]
    }

    fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange::new(start, end).unwrap()
    }

    #[test]
    fn option_write_then_read_inside_range() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let contract = contract();

        cache
            .write_option(&contract, range(d(2024, 1, 1), d(2024, 1, 31)), &eod_rows())
            .unwrap();

        let rows = cache
            .read_option(&contract, range(d(2024, 1, 3), d(2024, 1, 10)))
            .unwrap()
            .expect("covered");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, 13.6);
        assert_eq!(rows[0].count, 64);
    }

    #[test]
    fn option_read_outside_range_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let contract = contract();
        cache
            .write_option(&contract, range(d(2024, 1, 1), d(2024, 1, 31)), &eod_rows())
            .unwrap();

        let wider = range(d(2023, 12, 1), d(2024, 1, 31));
        assert!(cache.read_option(&contract, wider).unwrap().is_none());
        assert_eq!(
            cache.option_coverage(&contract, wider),
            CoverageResult::PartiallyCovered {
                cached_start: d(2024, 1, 1),
                cached_end: d(2024, 1, 31),
            }
        );
    }

    #[test]
    fn overlap_read_serves_the_cached_part() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let contract = contract();
        cache
            .write_option(&contract, range(d(2024, 1, 1), d(2024, 1, 3)), &eod_rows())
            .unwrap();

        let later = range(d(2024, 1, 3), d(2024, 1, 20));
        assert!(cache.read_option(&contract, later).unwrap().is_none());
        let rows = cache.read_option_overlap(&contract, later).unwrap().expect("overlaps");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, d(2024, 1, 3));

        let disjoint = range(d(2024, 2, 1), d(2024, 2, 20));
        assert!(cache.read_option_overlap(&contract, disjoint).unwrap().is_none());
    }

    #[test]
    fn stock_roundtrip_keeps_long_name() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let bars = vec![StockBar {
            date: d(2024, 1, 2),
            open: 472.2,
            high: 473.7,
            low: 470.5,
            close: 472.7,
            adj_close: 468.8,
            volume: 123_623_700,
        }];
        let r = range(d(2024, 1, 1), d(2024, 1, 5));
        cache.write_stock("SPY", r, Some("SPDR S&P 500 ETF Trust"), &bars).unwrap();

        let (name, loaded) = cache.read_stock("SPY", r).unwrap().expect("covered");
        assert_eq!(name.as_deref(), Some("SPDR S&P 500 ETF Trust"));
        assert_eq!(loaded, bars);
    }

    #[test]
    fn empty_stock_download_is_cached_as_meta() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let r = range(d(2024, 1, 1), d(2024, 1, 5));
        cache.write_stock("NOPE", r, None, &[]).unwrap();

        let (name, bars) = cache.read_stock("NOPE", r).unwrap().expect("covered");
        assert!(name.is_none());
        assert!(bars.is_empty());
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let contract = contract();
        let r = range(d(2024, 1, 1), d(2024, 1, 31));
        cache.write_option(&contract, r, &eod_rows()).unwrap();

        let path = cache.option_path(&contract);
        fs::write(&path, b"not parquet").unwrap();

        assert!(cache.read_option(&contract, r).unwrap().is_none());
        assert!(path.with_extension("parquet.quarantined").exists());
        assert_eq!(cache.option_coverage(&contract, r), CoverageResult::NotCached);
    }

    #[test]
    fn offline_chain_listing_reflects_cached_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let r = range(d(2024, 1, 1), d(2024, 1, 31));
        let mut c = contract();
        cache.write_option(&c, r, &eod_rows()).unwrap();
        c.strike = Strike(470_000);
        cache.write_option(&c, r, &eod_rows()).unwrap();

        assert_eq!(cache.cached_roots(), vec!["SPY".to_string()]);
        let exps = cache.cached_expirations("SPY");
        assert_eq!(exps, vec![Expiration(d(2024, 3, 15))]);
        assert_eq!(
            cache.cached_strikes("SPY", exps[0]),
            vec![Strike(470_000), Strike(480_000)]
        );
    }
}
