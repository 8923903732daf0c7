//! Provider traits and structured error types.
//!
//! `OptionChainSource` abstracts the option market-data terminal and
//! `QuoteSource` the stock downloader, so the dashboard can run against the
//! live services, the parquet cache, or an in-memory fake in tests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DateRange, Expiration, OptionContract, OptionEod, StockBar, Strike};

/// Structured error types for data operations.
///
/// These are designed to be displayable in both CLI and TUI contexts.
#[derive(Debug, Error)]
pub enum DataError {
    /// The provider answered but has nothing for this request.
    #[error("no data: {0}")]
    NoData(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("theta terminal unreachable at {url}: {reason}")]
    TerminalUnreachable { url: String, reason: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("server error HTTP {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("provider error {kind}: {message}")]
    Provider { kind: String, message: String },

    #[error("hard stop: {provider} has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped { provider: String },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("no cached data for '{key}' (offline mode)")]
    NoCachedData { key: String },

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Errors the dashboard turns into an empty result plus a message,
    /// rather than surfacing as a failure.
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            DataError::NoData(_) | DataError::InvalidInput(_) | DataError::NoCachedData { .. }
        )
    }

    /// Worth retrying after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_)
                | DataError::RateLimited { .. }
                | DataError::ServerError { .. }
        )
    }
}

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    ThetaTerminal,
    YahooFinance,
    Cache,
    Memory,
}

/// Result of a stock quote download.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteDownload {
    pub symbol: String,
    /// Company long name, when the provider reports one.
    pub long_name: Option<String>,
    pub bars: Vec<StockBar>,
    pub source: DataSource,
}

impl QuoteDownload {
    pub fn empty(symbol: &str, source: DataSource) -> Self {
        Self {
            symbol: symbol.to_string(),
            long_name: None,
            bars: Vec::new(),
            source,
        }
    }
}

/// The option market-data terminal: chain enumeration and EOD history.
pub trait OptionChainSource: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Roots that have listed options.
    fn roots(&self) -> Result<Vec<String>, DataError>;

    /// Expirations listed for a root, in provider order.
    fn expirations(&self, root: &str) -> Result<Vec<Expiration>, DataError>;

    /// Strikes listed for a root and expiration.
    fn strikes(&self, root: &str, expiration: Expiration) -> Result<Vec<Strike>, DataError>;

    /// Daily history of one contract. `NoData` when the contract has no
    /// records inside the range.
    fn hist_option_eod(
        &self,
        contract: &OptionContract,
        range: DateRange,
    ) -> Result<Vec<OptionEod>, DataError>;
}

/// The stock quote downloader.
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;

    /// Daily bars over `range`. An unknown symbol yields an empty download,
    /// not an error.
    fn download(&self, symbol: &str, range: DateRange) -> Result<QuoteDownload, DataError>;
}

impl<T: OptionChainSource + ?Sized> OptionChainSource for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn roots(&self) -> Result<Vec<String>, DataError> {
        (**self).roots()
    }

    fn expirations(&self, root: &str) -> Result<Vec<Expiration>, DataError> {
        (**self).expirations(root)
    }

    fn strikes(&self, root: &str, expiration: Expiration) -> Result<Vec<Strike>, DataError> {
        (**self).strikes(root, expiration)
    }

    fn hist_option_eod(
        &self,
        contract: &OptionContract,
        range: DateRange,
    ) -> Result<Vec<OptionEod>, DataError> {
        (**self).hist_option_eod(contract, range)
    }
}

impl<T: QuoteSource + ?Sized> QuoteSource for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn download(&self, symbol: &str, range: DateRange) -> Result<QuoteDownload, DataError> {
        (**self).download(symbol, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_classification() {
        assert!(DataError::NoData("x".into()).is_no_data());
        assert!(DataError::InvalidInput("x".into()).is_no_data());
        assert!(!DataError::NetworkUnreachable("x".into()).is_no_data());
        assert!(!DataError::ResponseFormatChanged("x".into()).is_no_data());
    }

    #[test]
    fn transient_classification() {
        assert!(DataError::RateLimited { retry_after_secs: 5 }.is_transient());
        assert!(DataError::ServerError { status: 503, message: String::new() }.is_transient());
        assert!(!DataError::NoData("x".into()).is_transient());
        assert!(!DataError::AuthenticationRequired("x".into()).is_transient());
    }

    #[test]
    fn messages_are_displayable() {
        let err = DataError::TerminalUnreachable {
            url: "http://127.0.0.1:25510".into(),
            reason: "connection refused".into(),
        };
        assert!(err.to_string().contains("127.0.0.1:25510"));
    }
}
