//! Loading everything one dashboard view needs.
//!
//! `ChainLoader` answers the sidebar cascade (symbols, expirations,
//! strikes). `Dashboard::load` turns a set of selections into stock quotes
//! plus the combined option history, downgrading "no data" answers from the
//! option provider to a user-facing message.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::data::{
    CacheMode, CachedChain, CachedQuotes, CircuitBreaker, DataError, OptionChainSource,
    ParquetCache, QuoteSource, ThetaClient, YahooProvider,
};
use crate::domain::{DateRange, Expiration, OptionContract, Strike};
use crate::frame::{DataField, OptionHistory, StockQuotes};
use crate::session::Selections;

pub const NO_DATA_MESSAGE: &str = "No data available for the selected options.";
pub const NO_OPTION_DATA_MESSAGE: &str = "No option data available for the selected criteria.";

/// Chain enumeration for the selection widgets.
#[derive(Clone)]
pub struct ChainLoader {
    chain: Arc<dyn OptionChainSource>,
}

impl ChainLoader {
    pub fn new(chain: Arc<dyn OptionChainSource>) -> Self {
        Self { chain }
    }

    pub fn list_symbols(&self) -> Result<Vec<String>, DataError> {
        let mut roots = self.chain.roots()?;
        roots.sort();
        roots.dedup();
        Ok(roots)
    }

    /// Latest expiration first. A symbol with no listed options gives an
    /// empty list.
    pub fn list_expirations(&self, symbol: &str) -> Result<Vec<Expiration>, DataError> {
        let mut exps = empty_on_no_data(self.chain.expirations(symbol), symbol)?;
        exps.sort_by(|a, b| b.cmp(a));
        exps.dedup();
        Ok(exps)
    }

    pub fn list_strikes(&self, symbol: &str, expiration: Expiration) -> Result<Vec<Strike>, DataError> {
        let mut strikes = empty_on_no_data(self.chain.strikes(symbol, expiration), symbol)?;
        strikes.sort();
        strikes.dedup();
        Ok(strikes)
    }
}

fn empty_on_no_data<T>(listing: Result<Vec<T>, DataError>, symbol: &str) -> Result<Vec<T>, DataError> {
    match listing {
        Err(e) if e.is_no_data() => {
            debug!(symbol, error = %e, "empty listing");
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Result of one dashboard load.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardData {
    pub symbol: String,
    pub long_name: Option<String>,
    pub quotes: StockQuotes,
    pub history: OptionHistory,
    /// User-facing notices (no-data answers and the like).
    pub messages: Vec<String>,
    /// Cleared when the matching fetch came back empty.
    pub primary_expiration: Option<Expiration>,
    pub secondary_expiration: Option<Expiration>,
}

impl DashboardData {
    pub fn headline(&self) -> String {
        let name = self.long_name.as_deref().unwrap_or(&self.symbol);
        format!(
            "Symbol: {} - {} - Latest Price: {:.2}",
            self.symbol,
            name,
            self.quotes.latest_close()
        )
    }

    pub fn option_title(field: DataField) -> String {
        format!("Option {} Chart", field.label())
    }

    /// Expirations that contributed rows, e.g. `2024-06-21 + 2024-07-19`.
    pub fn expirations_label(&self) -> Option<String> {
        let labels: Vec<String> = [self.primary_expiration, self.secondary_expiration]
            .into_iter()
            .flatten()
            .map(|e| e.label())
            .collect();
        (!labels.is_empty()).then(|| labels.join(" + "))
    }

    /// The empty-history notice, if the combined history is empty.
    pub fn no_option_data(&self) -> Option<&'static str> {
        self.history.is_empty().then_some(NO_OPTION_DATA_MESSAGE)
    }
}

pub struct Dashboard {
    loader: ChainLoader,
    quotes: Arc<dyn QuoteSource>,
}

impl Dashboard {
    pub fn new(chain: Arc<dyn OptionChainSource>, quotes: Arc<dyn QuoteSource>) -> Self {
        Self {
            loader: ChainLoader::new(chain),
            quotes,
        }
    }

    /// The live provider stack from `config`, behind the parquet cache
    /// unless caching is disabled. Offline mode always reads the cache.
    pub fn from_config(config: &AppConfig, offline: bool) -> Result<Self, DataError> {
        let theta = ThetaClient::new(&config.theta, Arc::new(CircuitBreaker::default_for("theta")))?;
        let yahoo = YahooProvider::new(&config.yahoo, Arc::new(CircuitBreaker::default_for("yahoo")))?;

        if !config.cache.enabled && !offline {
            info!("parquet cache disabled");
            return Ok(Self::new(Arc::new(theta), Arc::new(yahoo)));
        }

        let cache = Arc::new(ParquetCache::new(&config.cache.dir));
        let mode = if offline {
            CacheMode::Offline
        } else {
            CacheMode::ReadWrite
        };
        info!(dir = %config.cache.dir.display(), ?mode, "using parquet cache");
        Ok(Self::new(
            Arc::new(CachedChain::new(theta, Arc::clone(&cache), mode)),
            Arc::new(CachedQuotes::new(yahoo, cache, mode)),
        ))
    }

    pub fn loader(&self) -> &ChainLoader {
        &self.loader
    }

    /// One option fetch. "No data" and invalid-input answers become `None`.
    fn fetch_guarded(
        &self,
        contract: &OptionContract,
        range: DateRange,
    ) -> Result<Option<OptionHistory>, DataError> {
        match self.loader.chain.hist_option_eod(contract, range) {
            Ok(rows) => {
                info!(%contract, rows = rows.len(), "option history loaded");
                Ok(Some(OptionHistory::label(contract.expiration, rows)))
            }
            Err(e) if e.is_no_data() => {
                warn!(%contract, error = %e, "no option data");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Daily bars of the underlying. An unknown symbol, or one with nothing
    /// cached when offline, gives empty quotes.
    pub fn stock_quotes(&self, symbol: &str, range: DateRange) -> Result<StockQuotes, DataError> {
        let download = match self.quotes.download(symbol, range) {
            Ok(download) => download,
            Err(e @ DataError::NoCachedData { .. }) => {
                warn!(symbol, error = %e, "no cached quotes");
                return Ok(StockQuotes::default());
            }
            Err(e) => return Err(e),
        };
        debug!(symbol, source = ?download.source, bars = download.bars.len(), "stock quotes");
        Ok(StockQuotes {
            long_name: download.long_name,
            bars: download.bars,
        })
    }

    pub fn load(&self, selections: &Selections) -> Result<DashboardData, DataError> {
        let symbol = selections
            .symbol
            .clone()
            .ok_or_else(|| DataError::InvalidInput("no symbol selected".into()))?;
        let range = selections.range();
        let mut messages = Vec::new();

        let (primary, secondary) = match (selections.option_request(), &range) {
            (Some(request), Ok(range)) => {
                let (primary, secondary) = rayon::join(
                    || self.fetch_guarded(&request.primary, *range),
                    || {
                        request
                            .secondary
                            .as_ref()
                            .map(|c| self.fetch_guarded(c, *range))
                            .transpose()
                    },
                );
                (primary?, secondary?.flatten())
            }
            (_, Err(e)) => {
                warn!(symbol = %symbol, error = %e, "invalid date range");
                (None, None)
            }
            (None, Ok(_)) => (None, None),
        };

        let mut primary_expiration = selections.expiration;
        if primary.is_none() {
            messages.push(NO_DATA_MESSAGE.to_string());
            primary_expiration = None;
        }
        let mut secondary_expiration = selections.active_secondary();
        if secondary_expiration.is_some() && secondary.is_none() {
            if !messages.iter().any(|m| m == NO_DATA_MESSAGE) {
                messages.push(NO_DATA_MESSAGE.to_string());
            }
            secondary_expiration = None;
        }
        // the secondary is only ever shown next to the primary
        if primary_expiration.is_none() {
            secondary_expiration = None;
        }

        let quotes = match range {
            Ok(range) => self.stock_quotes(&symbol, range)?,
            Err(_) => StockQuotes::default(),
        };

        let history = OptionHistory::combine(primary.unwrap_or_default(), secondary);
        info!(
            symbol = %symbol,
            bars = quotes.bars.len(),
            rows = history.len(),
            "dashboard loaded"
        );

        Ok(DashboardData {
            symbol,
            long_name: quotes.long_name.clone(),
            quotes,
            history,
            messages,
            primary_expiration,
            secondary_expiration,
        })
    }
}
