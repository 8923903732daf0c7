//! optview core: domain types, market-data providers, the parquet cache,
//! frame reshaping, session state and the dashboard loader.
//!
//! - Option chain and EOD history from the Theta terminal
//! - Daily stock quotes and company names from Yahoo Finance
//! - Histories for several expirations combined and pivoted for charting

pub mod config;
pub mod dashboard;
pub mod data;
pub mod domain;
pub mod frame;
pub mod logging;
pub mod session;

pub use config::AppConfig;
pub use dashboard::{ChainLoader, Dashboard, DashboardData};
pub use session::{ChartKind, DisplayMode, Selections, ViewFlags};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything the TUI worker moves across threads
    /// is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Dashboard>();
        require_sync::<Dashboard>();
        require_send::<DashboardData>();
        require_sync::<DashboardData>();
        require_send::<Selections>();
        require_sync::<Selections>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
        require_send::<data::ThetaClient>();
        require_sync::<data::ThetaClient>();
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::ParquetCache>();
        require_sync::<data::ParquetCache>();
    }
}
