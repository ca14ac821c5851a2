use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use time::UtcOffset;
use tracing::debug;

use crate::http_client::{HttpClient, HttpRequest};
use crate::{Bar, Interval, Lookback, ScanError, Series, Symbol, ZonedDateTime};

/// Request payload for a bar fetch.
///
/// Extended hours and provider-side repair are always requested by the
/// fetcher; they are carried here so the provider can encode them and tests
/// can assert them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarsRequest {
    pub symbol: Symbol,
    pub interval: Interval,
    pub lookback: Lookback,
    pub include_extended_hours: bool,
    pub repair: bool,
}

impl BarsRequest {
    pub fn new(symbol: Symbol, interval: Interval, lookback: Lookback) -> Self {
        Self {
            symbol,
            interval,
            lookback,
            include_extended_hours: true,
            repair: true,
        }
    }
}

/// Upstream market-data contract.
///
/// Implementations must be `Send + Sync`; one request is in flight per symbol
/// at a time (the fetcher serializes per-symbol calls), but different symbols
/// call concurrently.
pub trait MarketDataProvider: Send + Sync {
    fn bars<'a>(
        &'a self,
        req: BarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Series, ScanError>> + Send + 'a>>;
}

/// Provider speaking the chart-document JSON dialect: an epoch-second
/// timestamp array with parallel nullable OHLCV arrays, wrapped in a
/// result/error envelope that carries the exchange's UTC offset.
pub struct ChartApiProvider {
    base_url: String,
    http_client: Arc<dyn HttpClient>,
}

impl ChartApiProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://query1.finance.yahoo.com";

    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: String::from(Self::DEFAULT_BASE_URL),
            http_client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, req: &BarsRequest) -> String {
        format!(
            "{}/v8/finance/chart/{}?interval={}&range={}d&includePrePost={}&repair={}",
            self.base_url,
            urlencoding::encode(req.symbol.as_str()),
            req.interval.as_str(),
            req.lookback.as_days(),
            req.include_extended_hours,
            req.repair,
        )
    }

    async fn fetch_chart(&self, req: BarsRequest) -> Result<Series, ScanError> {
        let endpoint = self.endpoint(&req);
        debug!(symbol = %req.symbol, interval = %req.interval, "dispatching chart request");

        let request = HttpRequest::get(&endpoint).with_header("accept", "application/json");
        let response = self.http_client.execute(request).await.map_err(|error| {
            if error.timed_out() {
                ScanError::network_timeout(format!("chart request timed out: {}", error.message()))
            } else {
                ScanError::network_timeout(format!("chart transport error: {}", error.message()))
            }
        })?;

        if response.status == 404 {
            return Err(ScanError::symbol_not_found(format!(
                "no instrument for '{}'",
                req.symbol
            )));
        }
        if !response.is_success() {
            return Err(ScanError::upstream(
                response.status,
                format!("chart endpoint returned status {}", response.status),
            ));
        }

        parse_chart_document(&response.body, &req)
    }
}

impl MarketDataProvider for ChartApiProvider {
    fn bars<'a>(
        &'a self,
        req: BarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Series, ScanError>> + Send + 'a>> {
        Box::pin(self.fetch_chart(req))
    }
}

fn parse_chart_document(body: &str, req: &BarsRequest) -> Result<Series, ScanError> {
    let document: ChartResponse = serde_json::from_str(body)
        .map_err(|e| ScanError::json_decode(format!("malformed chart document: {e}")))?;

    if let Some(fault) = document.chart.error {
        if fault.code.eq_ignore_ascii_case("not found") {
            return Err(ScanError::symbol_not_found(fault.description));
        }
        return Err(ScanError::json_decode(format!(
            "chart fault {}: {}",
            fault.code, fault.description
        )));
    }

    let result = document
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| ScanError::empty_response("chart document has no result"))?;

    let timestamps = result.timestamp.unwrap_or_default();
    if timestamps.is_empty() {
        return Err(ScanError::empty_response("chart result has no rows"));
    }

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ScanError::empty_response("chart result has no quote block"))?;

    let offset = UtcOffset::from_whole_seconds(result.meta.gmtoffset as i32)
        .map_err(|_| ScanError::json_decode("chart meta carries an invalid gmtoffset"))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    let mut prev_ts: Option<ZonedDateTime> = None;
    for (i, &secs) in timestamps.iter().enumerate() {
        // Rows with any null price are provider gaps; skip them outright.
        // Out-of-envelope values are kept for the quality validator to judge.
        let (open, high, low, close) = match (
            quote.open.get(i).copied().flatten(),
            quote.high.get(i).copied().flatten(),
            quote.low.get(i).copied().flatten(),
            quote.close.get(i).copied().flatten(),
        ) {
            (Some(open), Some(high), Some(low), Some(close)) => (open, high, low, close),
            _ => continue,
        };

        let ts = ZonedDateTime::from_unix_with_offset(secs, offset)
            .map_err(|e| ScanError::json_decode(e.to_string()))?;
        if prev_ts.is_some_and(|prev| ts <= prev) {
            continue;
        }
        prev_ts = Some(ts);

        let volume = quote.volume.get(i).copied().flatten().unwrap_or(0);
        bars.push(Bar {
            ts,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    if bars.is_empty() {
        return Err(ScanError::empty_response(
            "chart result contains only null rows",
        ));
    }

    Series::new(req.symbol.clone(), req.interval, bars)
        .map_err(|e| ScanError::json_decode(e.to_string()))
}

/// Scripted provider for deterministic tests.
///
/// Outcomes queued per symbol are replayed in order, falling back to a
/// shared queue; every call is recorded so tests can assert how many
/// provider calls an operation made, including zero for pre-network
/// failures. Per-symbol queues keep concurrent scans deterministic.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<Series, ScanError>>>,
    per_symbol: Mutex<HashMap<Symbol, VecDeque<Result<Series, ScanError>>>>,
    calls: Mutex<Vec<BarsRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, series: Series) {
        self.responses
            .lock()
            .expect("scripted responses lock is not poisoned")
            .push_back(Ok(series));
    }

    pub fn push_err(&self, error: ScanError) {
        self.responses
            .lock()
            .expect("scripted responses lock is not poisoned")
            .push_back(Err(error));
    }

    pub fn push_for(&self, symbol: &Symbol, outcome: Result<Series, ScanError>) {
        self.per_symbol
            .lock()
            .expect("scripted per-symbol lock is not poisoned")
            .entry(symbol.clone())
            .or_default()
            .push_back(outcome);
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .expect("scripted calls lock is not poisoned")
            .len()
    }

    pub fn calls(&self) -> Vec<BarsRequest> {
        self.calls
            .lock()
            .expect("scripted calls lock is not poisoned")
            .clone()
    }
}

impl MarketDataProvider for ScriptedProvider {
    fn bars<'a>(
        &'a self,
        req: BarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Series, ScanError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls
                .lock()
                .expect("scripted calls lock is not poisoned")
                .push(req.clone());

            let scripted = self
                .per_symbol
                .lock()
                .expect("scripted per-symbol lock is not poisoned")
                .get_mut(&req.symbol)
                .and_then(VecDeque::pop_front);
            if let Some(outcome) = scripted {
                return outcome;
            }

            self.responses
                .lock()
                .expect("scripted responses lock is not poisoned")
                .pop_front()
                .unwrap_or_else(|| {
                    Err(ScanError::empty_response(format!(
                        "no scripted response for '{}'",
                        req.symbol
                    )))
                })
        })
    }
}

// Chart-document envelope.

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartDocument,
}

#[derive(Debug, Deserialize)]
struct ChartDocument {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartFault>,
}

#[derive(Debug, Deserialize)]
struct ChartFault {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize, Default)]
struct ChartQuote {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScanErrorKind;

    fn request() -> BarsRequest {
        BarsRequest::new(
            Symbol::parse("AAPL").expect("symbol"),
            Interval::OneMinute,
            Lookback::days(5),
        )
    }

    #[test]
    fn parses_chart_rows_and_skips_null_gaps() {
        let body = r#"{
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": -18000 },
                    "timestamp": [1709562600, 1709562660, 1709562720],
                    "indicators": { "quote": [{
                        "open":   [10.0, null, 10.2],
                        "high":   [10.5, 10.6, 10.7],
                        "low":    [9.9, 10.0, 10.1],
                        "close":  [10.2, 10.3, 10.4],
                        "volume": [1000, 1100, null]
                    }]}
                }],
                "error": null
            }
        }"#;

        let series = parse_chart_document(body, &request()).expect("must parse");
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars[0].ts.time().hour(), 9);
        assert_eq!(series.bars[1].volume, 0);
    }

    #[test]
    fn maps_not_found_fault() {
        let body = r#"{
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found" }
            }
        }"#;

        let err = parse_chart_document(body, &request()).expect_err("must fail");
        assert_eq!(err.kind(), ScanErrorKind::SymbolNotFound);
    }

    #[test]
    fn all_null_rows_classify_as_empty_response() {
        let body = r#"{
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": -18000 },
                    "timestamp": [1709562600],
                    "indicators": { "quote": [{
                        "open": [null], "high": [null], "low": [null],
                        "close": [null], "volume": [null]
                    }]}
                }],
                "error": null
            }
        }"#;

        let err = parse_chart_document(body, &request()).expect_err("must fail");
        assert_eq!(err.kind(), ScanErrorKind::EmptyResponse);
    }

    #[test]
    fn truncated_body_classifies_as_decode_error() {
        let err = parse_chart_document("{\"chart\": {", &request()).expect_err("must fail");
        assert_eq!(err.kind(), ScanErrorKind::JsonDecodeError);
        assert!(err.retryable());
    }

    #[tokio::test]
    async fn scripted_provider_records_calls() {
        let provider = ScriptedProvider::new();
        provider.push_err(ScanError::empty_response("scripted"));

        let outcome = provider.bars(request()).await;
        assert!(outcome.is_err());
        assert_eq!(provider.call_count(), 1);
        assert!(provider.calls()[0].include_extended_hours);
        assert!(provider.calls()[0].repair);
    }
}
