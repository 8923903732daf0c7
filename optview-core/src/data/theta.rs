//! Theta terminal client.
//!
//! Talks to the locally running Theta terminal over its v2 REST API. Every
//! response is an envelope `{ "header": {...}, "response": [...] }`; list
//! endpoints return scalars, history endpoints return positional rows whose
//! column names are listed in `header.format`. Long responses are paged via
//! `header.next_page`.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, OptionChainSource};
use crate::config::ThetaConfig;
use crate::domain::{
    date_from_wire, date_to_wire, DateRange, Expiration, OptionContract, OptionEod, Strike,
};

/// Status the terminal uses for "no data for this request".
const STATUS_NO_DATA: u16 = 472;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    header: Header,
    #[serde(default = "Vec::new")]
    response: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct Header {
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error_msg: Option<String>,
    #[serde(default)]
    next_page: Option<String>,
    #[serde(default)]
    format: Option<Vec<String>>,
}

/// The terminal writes the literal string "null" for absent header fields.
fn present(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
}

impl Header {
    fn check(&self) -> Result<(), DataError> {
        let Some(kind) = present(&self.error_type) else {
            return Ok(());
        };
        let message = present(&self.error_msg).unwrap_or(kind).to_string();
        if kind.eq_ignore_ascii_case("NO_DATA") {
            Err(DataError::NoData(message))
        } else {
            Err(DataError::Provider {
                kind: kind.to_string(),
                message,
            })
        }
    }
}

/// Blocking client for the Theta terminal.
pub struct ThetaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl ThetaClient {
    pub fn new(config: &ThetaConfig, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            circuit_breaker,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(250),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn roots_url(&self) -> String {
        format!("{}/v2/list/roots/option", self.base_url)
    }

    fn expirations_url(&self, root: &str) -> String {
        format!("{}/v2/list/expirations?root={root}", self.base_url)
    }

    fn strikes_url(&self, root: &str, exp: Expiration) -> String {
        format!(
            "{}/v2/list/strikes?root={root}&exp={}",
            self.base_url,
            exp.to_wire()
        )
    }

    fn eod_url(&self, contract: &OptionContract, range: DateRange) -> String {
        format!(
            "{}/v2/hist/option/eod?root={}&exp={}&strike={}&right={}&start_date={}&end_date={}",
            self.base_url,
            contract.root,
            contract.expiration.to_wire(),
            contract.strike.0,
            contract.right.letter(),
            date_to_wire(range.start()),
            date_to_wire(range.end()),
        )
    }

    /// Fetch every page of a list or history endpoint.
    ///
    /// Returns the column format of the first page (history endpoints only)
    /// and the concatenated response rows.
    fn fetch_pages<T: DeserializeOwned>(
        &self,
        first_url: String,
    ) -> Result<(Option<Vec<String>>, Vec<T>), DataError> {
        let mut url = first_url;
        let mut format = None;
        let mut rows = Vec::new();

        loop {
            let body = self.get_with_retry(&url)?;
            let page: Envelope<T> = parse_envelope(&body)?;
            if format.is_none() {
                format = page.header.format.clone();
            }
            rows.extend(page.response);

            match present(&page.header.next_page) {
                Some(next) => {
                    debug!(next, "following next page");
                    url = next.to_string();
                }
                None => break,
            }
        }

        Ok((format, rows))
    }

    /// One GET with backoff retry, returning the body text.
    fn get_with_retry(&self, url: &str) -> Result<String, DataError> {
        let provider = self.circuit_breaker.provider().to_string();
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped { provider });
            }

            debug!(url, attempt, "theta request");
            let err = match self.client.get(url).send() {
                Err(e) if e.is_connect() => {
                    return Err(DataError::TerminalUnreachable {
                        url: self.base_url.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => DataError::NetworkUnreachable(e.to_string()),
                Ok(resp) => {
                    let status = resp.status();
                    if status.as_u16() == STATUS_NO_DATA {
                        self.circuit_breaker.record_success();
                        let msg = resp.text().unwrap_or_default();
                        return Err(DataError::NoData(if msg.trim().is_empty() {
                            "no data for the requested contract".into()
                        } else {
                            msg.trim().to_string()
                        }));
                    }
                    if status.is_success() {
                        let body = resp
                            .text()
                            .map_err(|e| DataError::NetworkUnreachable(format!("reading body: {e}")))?;
                        self.circuit_breaker.record_success();
                        return Ok(body);
                    }
                    let message = resp.text().unwrap_or_default();
                    if status.is_server_error() {
                        warn!(%status, url, "theta terminal server error");
                        DataError::ServerError {
                            status: status.as_u16(),
                            message,
                        }
                    } else {
                        DataError::Provider {
                            kind: format!("HTTP {status}"),
                            message,
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

fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<Envelope<T>, DataError> {
    let envelope: Envelope<T> = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("theta envelope: {e}")))?;
    envelope.header.check()?;
    Ok(envelope)
}

/// Positional column lookup for history rows.
struct EodColumns {
    date: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: Option<usize>,
    volume: Option<usize>,
    count: Option<usize>,
    bid: Option<usize>,
    ask: Option<usize>,
}

impl EodColumns {
    fn from_format(format: &[String]) -> Result<Self, DataError> {
        let find = |name: &str| format.iter().position(|c| c.eq_ignore_ascii_case(name));
        let date = find("date").ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("no 'date' column in {format:?}"))
        })?;
        Ok(Self {
            date,
            open: find("open"),
            high: find("high"),
            low: find("low"),
            close: find("close"),
            volume: find("volume"),
            count: find("count"),
            bid: find("bid"),
            ask: find("ask"),
        })
    }

    fn parse_row(&self, row: &[Value]) -> Result<OptionEod, DataError> {
        let float = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
        };
        let int = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
                .unwrap_or(0)
        };

        let raw_date = row
            .get(self.date)
            .and_then(Value::as_u64)
            .and_then(|d| u32::try_from(d).ok())
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("bad date in row {row:?}")))?;
        let date = date_from_wire(raw_date)?;

        Ok(OptionEod {
            date,
            open: float(self.open),
            high: float(self.high),
            low: float(self.low),
            close: float(self.close),
            volume: int(self.volume),
            count: int(self.count),
            bid: float(self.bid),
            ask: float(self.ask),
        })
    }
}

fn parse_eod_rows(format: Option<Vec<String>>, rows: Vec<Vec<Value>>) -> Result<Vec<OptionEod>, DataError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let format = format
        .ok_or_else(|| DataError::ResponseFormatChanged("history response without format".into()))?;
    let columns = EodColumns::from_format(&format)?;
    let mut parsed = rows
        .iter()
        .map(|row| columns.parse_row(row))
        .collect::<Result<Vec<_>, _>>()?;
    parsed.sort_by_key(|r| r.date);
    Ok(parsed)
}

impl OptionChainSource for ThetaClient {
    fn name(&self) -> &str {
        "theta_terminal"
    }

    fn roots(&self) -> Result<Vec<String>, DataError> {
        let (_, roots): (_, Vec<String>) = self.fetch_pages(self.roots_url())?;
        info!(count = roots.len(), "listed option roots");
        Ok(roots)
    }

    fn expirations(&self, root: &str) -> Result<Vec<Expiration>, DataError> {
        let (_, raw): (_, Vec<u32>) = self.fetch_pages(self.expirations_url(root))?;
        raw.into_iter().map(Expiration::from_wire).collect()
    }

    fn strikes(&self, root: &str, expiration: Expiration) -> Result<Vec<Strike>, DataError> {
        let (_, raw): (_, Vec<u32>) = self.fetch_pages(self.strikes_url(root, expiration))?;
        let mut strikes: Vec<Strike> = raw.into_iter().map(Strike).collect();
        strikes.sort();
        strikes.dedup();
        Ok(strikes)
    }

    fn hist_option_eod(
        &self,
        contract: &OptionContract,
        range: DateRange,
    ) -> Result<Vec<OptionEod>, DataError> {
        let (format, rows): (_, Vec<Vec<Value>>) = self.fetch_pages(self.eod_url(contract, range))?;
        let parsed = parse_eod_rows(format, rows)?;
        if parsed.is_empty() {
            return Err(DataError::NoData(format!("no EOD records for {contract} in {range}")));
        }
        info!(contract = %contract, rows = parsed.len(), "fetched option EOD");
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OptionRight;
    use chrono::NaiveDate;

    const EOD_BODY: &str = r#"{
        "header": {
            "latency_ms": 12,
            "error_type": "null",
            "error_msg": "null",
            "next_page": "null",
            "format": ["ms_of_day","ms_of_day2","open","high","low","close","volume","count",
                       "bid_size","bid_exchange","bid","bid_condition",
                       "ask_size","ask_exchange","ask","ask_condition","date"]
        },
        "response": [
            [0,0,5.10,5.60,4.95,5.40,1200,87,10,1,5.35,0,12,1,5.45,0,20240103],
            [0,0,5.00,5.30,4.80,5.05,900,60,8,1,5.00,0,9,1,5.10,0,20240102]
        ]
    }"#;

    fn client() -> ThetaClient {
        ThetaClient::new(
            &ThetaConfig::default(),
            Arc::new(CircuitBreaker::default_for("theta")),
        )
        .unwrap()
    }

    #[test]
    fn parses_eod_rows_by_format() {
        let envelope: Envelope<Vec<Value>> = parse_envelope(EOD_BODY).unwrap();
        let rows = parse_eod_rows(envelope.header.format, envelope.response).unwrap();
        assert_eq!(rows.len(), 2);
        // sorted ascending by date
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(rows[1].close, 5.40);
        assert_eq!(rows[1].volume, 1200);
        assert_eq!(rows[1].count, 87);
        assert_eq!(rows[1].bid, 5.35);
        assert_eq!(rows[1].ask, 5.45);
    }

    #[test]
    fn out_of_range_date_is_a_format_error() {
        let format = vec!["close".to_string(), "date".to_string()];
        // 2^32 + 20240102 would wrap to a valid date if truncated
        let rows = vec![vec![Value::from(5.0), Value::from(4_315_207_398u64)]];
        let err = parse_eod_rows(Some(format), rows).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn no_data_header_maps_to_no_data() {
        let body = r#"{"header":{"error_type":"NO_DATA","error_msg":"No data for the specified timeframe"},"response":[]}"#;
        let err = parse_envelope::<Vec<Value>>(body).unwrap_err();
        assert!(matches!(err, DataError::NoData(_)));
        assert!(err.is_no_data());
    }

    #[test]
    fn other_header_errors_are_provider_errors() {
        let body = r#"{"header":{"error_type":"INVALID_PARAMS","error_msg":"bad strike"},"response":[]}"#;
        let err = parse_envelope::<u32>(body).unwrap_err();
        match err {
            DataError::Provider { kind, message } => {
                assert_eq!(kind, "INVALID_PARAMS");
                assert_eq!(message, "bad strike");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn list_envelope_parses_scalars() {
        let body = r#"{"header":{"error_type":"null","next_page":"null"},"response":[20240119,20240216]}"#;
        let envelope: Envelope<u32> = parse_envelope(body).unwrap();
        assert_eq!(envelope.response, vec![20240119, 20240216]);
        assert!(present(&envelope.header.next_page).is_none());
    }

    #[test]
    fn missing_date_column_is_format_change() {
        let format = Some(vec!["open".to_string(), "close".to_string()]);
        let rows = vec![vec![Value::from(1.0), Value::from(1.1)]];
        let err = parse_eod_rows(format, rows).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn eod_url_uses_wire_units() {
        let contract = OptionContract::new(
            "AAPL",
            Expiration(NaiveDate::from_ymd_opt(2024, 1, 19).unwrap()),
            Strike(190_000),
            OptionRight::Call,
        );
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 19).unwrap(),
        )
        .unwrap();
        let url = client().eod_url(&contract, range);
        assert!(url.starts_with("http://127.0.0.1:25510/v2/hist/option/eod?"));
        assert!(url.contains("root=AAPL"));
        assert!(url.contains("exp=20240119"));
        assert!(url.contains("strike=190000"));
        assert!(url.contains("right=C"));
        assert!(url.contains("start_date=20231201"));
        assert!(url.contains("end_date=20240119"));
    }
}
