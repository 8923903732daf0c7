//! In-memory providers.
//!
//! Stand-ins for the live providers in tests. Failures can be injected per
//! contract or per symbol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::provider::{DataError, DataSource, OptionChainSource, QuoteDownload, QuoteSource};
use crate::domain::{DateRange, Expiration, OptionContract, OptionEod, StockBar, Strike};

type Failure = Box<dyn Fn() -> DataError + Send + Sync>;

#[derive(Default)]
pub struct InMemoryChain {
    roots: Vec<String>,
    expirations: HashMap<String, Vec<Expiration>>,
    strikes: HashMap<(String, Expiration), Vec<Strike>>,
    histories: HashMap<OptionContract, Vec<OptionEod>>,
    failures: HashMap<OptionContract, Failure>,
    history_calls: AtomicUsize,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contract's history; its root, expiration and strike are
    /// listed as a side effect.
    pub fn with_history(mut self, contract: OptionContract, rows: Vec<OptionEod>) -> Self {
        self.list(&contract);
        self.histories.insert(contract, rows);
        self
    }

    /// Make `hist_option_eod` fail for this contract.
    pub fn with_failure(
        mut self,
        contract: OptionContract,
        failure: impl Fn() -> DataError + Send + Sync + 'static,
    ) -> Self {
        self.list(&contract);
        self.failures.insert(contract, Box::new(failure));
        self
    }

    /// A root with no listed expirations.
    pub fn with_root(mut self, root: &str) -> Self {
        if !self.roots.iter().any(|r| r == root) {
            self.roots.push(root.to_string());
        }
        self
    }

    fn list(&mut self, contract: &OptionContract) {
        let root = contract.root.clone();
        if !self.roots.contains(&root) {
            self.roots.push(root.clone());
        }
        let exps = self.expirations.entry(root.clone()).or_default();
        if !exps.contains(&contract.expiration) {
            exps.push(contract.expiration);
        }
        let strikes = self.strikes.entry((root, contract.expiration)).or_default();
        if !strikes.contains(&contract.strike) {
            strikes.push(contract.strike);
            strikes.sort();
        }
    }

    /// Number of history requests served so far.
    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::Relaxed)
    }
}

impl OptionChainSource for InMemoryChain {
    fn name(&self) -> &str {
        "memory"
    }

    fn roots(&self) -> Result<Vec<String>, DataError> {
        Ok(self.roots.clone())
    }

    /// An empty listing answers `NoData`, as the terminal does.
    fn expirations(&self, root: &str) -> Result<Vec<Expiration>, DataError> {
        match self.expirations.get(root) {
            Some(exps) if !exps.is_empty() => Ok(exps.clone()),
            _ => Err(DataError::NoData(format!("no expirations for {root}"))),
        }
    }

    fn strikes(&self, root: &str, expiration: Expiration) -> Result<Vec<Strike>, DataError> {
        match self.strikes.get(&(root.to_string(), expiration)) {
            Some(strikes) if !strikes.is_empty() => Ok(strikes.clone()),
            _ => Err(DataError::NoData(format!("no strikes for {root} {expiration}"))),
        }
    }

    fn hist_option_eod(
        &self,
        contract: &OptionContract,
        range: DateRange,
    ) -> Result<Vec<OptionEod>, DataError> {
        self.history_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(failure) = self.failures.get(contract) {
            return Err(failure());
        }
        let rows: Vec<OptionEod> = self
            .histories
            .get(contract)
            .map(|rows| rows.iter().filter(|r| range.contains(r.date)).cloned().collect())
            .unwrap_or_default();
        if rows.is_empty() {
            return Err(DataError::NoData(format!("{contract} {range}")));
        }
        Ok(rows)
    }
}

#[derive(Default)]
pub struct InMemoryQuotes {
    quotes: HashMap<String, (Option<String>, Vec<StockBar>)>,
    failures: HashMap<String, Failure>,
    download_calls: AtomicUsize,
}

impl InMemoryQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quotes(mut self, symbol: &str, long_name: Option<&str>, bars: Vec<StockBar>) -> Self {
        self.quotes
            .insert(symbol.to_string(), (long_name.map(str::to_string), bars));
        self
    }

    pub fn with_failure(
        mut self,
        symbol: &str,
        failure: impl Fn() -> DataError + Send + Sync + 'static,
    ) -> Self {
        self.failures.insert(symbol.to_string(), Box::new(failure));
        self
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::Relaxed)
    }
}

impl QuoteSource for InMemoryQuotes {
    fn name(&self) -> &str {
        "memory"
    }

    /// Range end is exclusive, like the live downloader.
    fn download(&self, symbol: &str, range: DateRange) -> Result<QuoteDownload, DataError> {
        self.download_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(failure) = self.failures.get(symbol) {
            return Err(failure());
        }
        let Some((long_name, bars)) = self.quotes.get(symbol) else {
            return Ok(QuoteDownload::empty(symbol, DataSource::Memory));
        };
        Ok(QuoteDownload {
            symbol: symbol.to_string(),
            long_name: long_name.clone(),
            bars: bars
                .iter()
                .filter(|b| b.date >= range.start() && b.date < range.end())
                .cloned()
                .collect(),
            source: DataSource::Memory,
        })
    }
}
