//! Yahoo Finance quote downloader.
//!
//! Fetches daily OHLCV bars and the company name from Yahoo's v8 chart API.
//! The range end is exclusive, as with the usual quote download tools, so a
//! request ending today returns bars through yesterday's close.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; parse failures surface as `ResponseFormatChanged`.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataSource, QuoteDownload, QuoteSource};
use crate::config::YahooConfig;
use crate::domain::{DateRange, StockBar};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Parsed chart payload before it is wrapped in a `QuoteDownload`.
#[derive(Debug)]
struct ParsedChart {
    long_name: Option<String>,
    bars: Vec<StockBar>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(config: &YahooConfig, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            circuit_breaker,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    fn chart_url(&self, symbol: &str, range: DateRange) -> String {
        let start_ts = midnight_utc(range.start());
        let end_ts = midnight_utc(range.end());
        format!(
            "{}/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true",
            self.base_url
        )
    }

    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<ParsedChart, DataError> {
        let Some(results) = resp.chart.result else {
            return match resp.chart.error {
                Some(err) if err.code == "Not Found" => {
                    debug!(symbol, "symbol not found, treating as empty");
                    Ok(ParsedChart {
                        long_name: None,
                        bars: Vec::new(),
                    })
                }
                Some(err) => Err(DataError::ResponseFormatChanged(format!(
                    "{}: {}",
                    err.code, err.description
                ))),
                None => Err(DataError::ResponseFormatChanged(
                    "empty result with no error".into(),
                )),
            };
        };

        let Some(data) = results.into_iter().next() else {
            return Ok(ParsedChart {
                long_name: None,
                bars: Vec::new(),
            });
        };

        let long_name = data
            .meta
            .and_then(|m| m.long_name.or(m.short_name))
            .filter(|n| !n.trim().is_empty());

        // No timestamps: the range held no trading days.
        let Some(timestamps) = data.timestamp else {
            return Ok(ParsedChart {
                long_name,
                bars: Vec::new(),
            });
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Holidays come back as all-null rows.
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }

            let close = close.unwrap_or(f64::NAN);
            let adj_close = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten())
                .unwrap_or(close);

            let bar = StockBar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close,
                adj_close,
                volume: volume.unwrap_or(0),
            };
            if !bar.is_sane() {
                warn!(symbol, %date, void = bar.is_void(), "dropping bad bar");
                continue;
            }
            bars.push(bar);
        }

        Ok(ParsedChart { long_name, bars })
    }

    fn fetch_with_retry(&self, symbol: &str, range: DateRange) -> Result<ParsedChart, DataError> {
        let provider = self.circuit_breaker.provider().to_string();
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped { provider });
        }

        let url = self.chart_url(symbol, range);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped { provider });
            }

            let err = match self.client.get(&url).send() {
                Err(e) => DataError::NetworkUnreachable(e.to_string()),
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped { provider });
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(DataError::AuthenticationRequired(
                            "Yahoo Finance requires authentication".into(),
                        ));
                    }

                    // Unknown symbols come back as 404 with a chart error body.
                    if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
                        let chart: ChartResponse = resp.json().map_err(|e| {
                            DataError::ResponseFormatChanged(format!(
                                "failed to parse response for {symbol}: {e}"
                            ))
                        })?;
                        let parsed = Self::parse_response(symbol, chart)?;
                        self.circuit_breaker.record_success();
                        return Ok(parsed);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        warn!(symbol, retry_after, "yahoo rate limited");
                        DataError::RateLimited {
                            retry_after_secs: retry_after,
                        }
                    } else if status.is_server_error() {
                        DataError::ServerError {
                            status: status.as_u16(),
                            message: format!("HTTP {status} for {symbol}"),
                        }
                    } else {
                        DataError::Provider {
                            kind: format!("HTTP {status}"),
                            message: format!("unexpected status for {symbol}"),
                        }
                    }
                }
            };

            if !err.is_transient() {
                return Err(err);
            }
            self.circuit_breaker.record_failure();
            last_error = Some(err);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
}

impl QuoteSource for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn download(&self, symbol: &str, range: DateRange) -> Result<QuoteDownload, DataError> {
        let parsed = self.fetch_with_retry(symbol, range)?;
        info!(symbol, bars = parsed.bars.len(), "downloaded stock quotes");
        Ok(QuoteDownload {
            symbol: symbol.to_string(),
            long_name: parsed.long_name,
            bars: parsed.bars,
            source: DataSource::YahooFinance,
        })
    }
}
