//! Market-data providers, the parquet cache and the cached wrappers.

pub mod cache;
pub mod cached;
pub mod circuit_breaker;
pub mod memory;
pub mod provider;
pub mod theta;
pub mod yahoo;

pub use cache::{CacheMeta, CoverageResult, ParquetCache};
pub use cached::{CacheMode, CachedChain, CachedQuotes};
pub use circuit_breaker::CircuitBreaker;
pub use memory::{InMemoryChain, InMemoryQuotes};
pub use provider::{DataError, DataSource, OptionChainSource, QuoteDownload, QuoteSource};
pub use theta::ThetaClient;
pub use yahoo::YahooProvider;
