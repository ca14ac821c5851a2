use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calendar::{ExchangeCalendar, MarketStatus};
use crate::fetcher::Fetcher;
use crate::indicators::{IndicatorRow, IndicatorSet};
use crate::quality::{self, QualityIssue};
use crate::resample::resample;
use crate::signal::{HtfContext, Signal, SignalEvaluator};
use crate::staleness::StalenessGuard;
use crate::{
    AlgorithmSettings, ConfigError, Interval, Lookback, ScanError, ScanErrorKind, Symbol,
    ZonedDateTime,
};

/// Fewest HTF bars worth confirming against: the EMA8 seed plus the dropped
/// forming bucket. Below this the fine series is too short to resample and a
/// direct coarse fetch is used instead.
const MIN_HTF_BARS: usize = 9;

/// Scan-wide knobs, distinct from the per-bar algorithm settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    pub interval: Interval,
    pub lookback: Lookback,
    /// Symbols dispatched per batch; batch N+1 starts once batch N's
    /// requests have been dispatched, not completed.
    pub batch_size: usize,
    /// Global deadline for the whole scan.
    pub deadline: Duration,
    /// Outbound request budget shared by every batch.
    pub requests_per_minute: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval: Interval::OneMinute,
            lookback: Lookback::days(5),
            batch_size: 20,
            deadline: Duration::from_secs(120),
            requests_per_minute: 120,
        }
    }
}

impl ScannerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.deadline.is_zero() {
            return Err(ConfigError::ZeroDeadline);
        }
        Ok(())
    }
}

/// Per-symbol terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolState {
    Ok,
    Empty,
    Stale,
    InsufficientBars,
    ApiError,
    CircuitBreaker,
}

impl From<ScanErrorKind> for SymbolState {
    fn from(kind: ScanErrorKind) -> Self {
        match kind {
            ScanErrorKind::EmptyResponse => Self::Empty,
            ScanErrorKind::StaleData => Self::Stale,
            ScanErrorKind::InsufficientBars => Self::InsufficientBars,
            ScanErrorKind::CircuitBreaker => Self::CircuitBreaker,
            _ => Self::ApiError,
        }
    }
}

/// Time spent on one symbol, split between network and computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTimings {
    pub fetch_ms: u64,
    pub algorithm_ms: u64,
}

/// Everything the external history/UI layer needs to render one symbol
/// without re-deriving anything. Immutable once finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: Symbol,
    pub state: SymbolState,
    pub bars_count: usize,
    pub last_timestamp: Option<ZonedDateTime>,
    pub error_kind: Option<ScanErrorKind>,
    pub error: Option<String>,
    pub market_status: Option<MarketStatus>,
    pub quality_score: f64,
    pub quality_issues: Vec<QualityIssue>,
    /// Indicator snapshot at the evaluated bar.
    pub indicators: Option<IndicatorRow>,
    pub signal: Option<Signal>,
    /// Failed-gate string when no signal was produced.
    pub rejection: Option<String>,
    pub timings: SymbolTimings,
}

impl SymbolReport {
    fn from_error(symbol: Symbol, error: &ScanError, timings: SymbolTimings) -> Self {
        Self {
            symbol,
            state: SymbolState::from(error.kind()),
            bars_count: 0,
            last_timestamp: None,
            error_kind: Some(error.kind()),
            error: Some(error.message().to_owned()),
            market_status: None,
            quality_score: 0.0,
            quality_issues: Vec::new(),
            indicators: None,
            signal: None,
            rejection: None,
            timings,
        }
    }
}

/// Derived overall status of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Completed,
    Partial,
    Failed,
}

/// Aggregate result of one orchestrated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub scan_id: Uuid,
    pub started_at: ZonedDateTime,
    pub reports: Vec<SymbolReport>,
    /// Summed per-symbol fetch time.
    pub fetch_ms: u64,
    /// Summed per-symbol indicator + evaluation time.
    pub algorithm_ms: u64,
    /// Wall-clock duration of the whole scan.
    pub total_ms: u64,
    pub error_counts: BTreeMap<ScanErrorKind, u32>,
}

impl ScanOutcome {
    /// Derived, never stored: completed when every symbol reached OK,
    /// failed when none did.
    pub fn status(&self) -> ScanStatus {
        let ok = self
            .reports
            .iter()
            .filter(|report| report.state == SymbolState::Ok)
            .count();
        if ok == self.reports.len() {
            ScanStatus::Completed
        } else if ok == 0 {
            ScanStatus::Failed
        } else {
            ScanStatus::Partial
        }
    }

    pub fn signals(&self) -> Vec<&Signal> {
        self.reports
            .iter()
            .filter_map(|report| report.signal.as_ref())
            .collect()
    }
}

/// Fans one independent pipeline instance out per symbol and folds the
/// results back into a single outcome. A failure in one symbol's pipeline
/// never aborts another's; partial results are always returned.
pub struct Scanner {
    fetcher: Arc<Fetcher>,
    calendar: ExchangeCalendar,
    settings: AlgorithmSettings,
    config: ScannerConfig,
}

impl Scanner {
    pub fn new(
        fetcher: Arc<Fetcher>,
        calendar: ExchangeCalendar,
        settings: AlgorithmSettings,
        config: ScannerConfig,
    ) -> Self {
        Self {
            fetcher,
            calendar,
            settings,
            config,
        }
    }

    /// Run one scan. Only configuration errors surface here; everything that
    /// goes wrong per symbol is recovered into its report.
    pub async fn scan(&self, symbols: &[Symbol]) -> Result<ScanOutcome, ConfigError> {
        self.settings.validate(self.config.interval)?;
        self.config.validate()?;

        let scan_id = Uuid::new_v4();
        let started_at = ZonedDateTime::now_utc();
        let started = Instant::now();
        info!(
            %scan_id,
            symbols = symbols.len(),
            interval = %self.config.interval,
            lookback = %self.config.lookback,
            "scan started"
        );

        let budget = NonZeroU32::new(self.config.requests_per_minute.max(1))
            .expect("requests_per_minute is clamped to at least one");
        let limiter = RateLimiter::direct(Quota::per_minute(budget));

        let mut join_set: JoinSet<SymbolReport> = JoinSet::new();
        let mut pending: HashSet<Symbol> = symbols.iter().cloned().collect();

        for batch in symbols.chunks(self.config.batch_size) {
            for symbol in batch {
                limiter.until_ready().await;

                let fetcher = Arc::clone(&self.fetcher);
                let calendar = self.calendar.clone();
                let settings = self.settings.clone();
                let interval = self.config.interval;
                let lookback = self.config.lookback;
                let symbol = symbol.clone();
                join_set.spawn(async move {
                    process_symbol(fetcher, calendar, settings, interval, lookback, symbol).await
                });
            }
        }

        let mut reports = Vec::with_capacity(symbols.len());
        let deadline = tokio::time::Instant::now() + self.config.deadline;
        loop {
            match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok(report))) => {
                    pending.remove(&report.symbol);
                    reports.push(report);
                }
                Ok(Some(Err(join_error))) => {
                    warn!("symbol task failed to join: {join_error}");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(%scan_id, pending = pending.len(), "scan deadline elapsed");
                    join_set.abort_all();
                    break;
                }
            }
        }

        // Whatever is still pending was aborted or lost; report it rather
        // than dropping it silently.
        for symbol in pending {
            let error = ScanError::network_timeout("scan deadline exceeded");
            reports.push(SymbolReport::from_error(
                symbol,
                &error,
                SymbolTimings::default(),
            ));
        }

        reports.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let mut error_counts: BTreeMap<ScanErrorKind, u32> = BTreeMap::new();
        for report in &reports {
            if let Some(kind) = report.error_kind {
                *error_counts.entry(kind).or_insert(0) += 1;
            }
        }

        let outcome = ScanOutcome {
            scan_id,
            started_at,
            fetch_ms: reports.iter().map(|r| r.timings.fetch_ms).sum(),
            algorithm_ms: reports.iter().map(|r| r.timings.algorithm_ms).sum(),
            total_ms: started.elapsed().as_millis() as u64,
            error_counts,
            reports,
        };

        info!(
            %scan_id,
            status = ?outcome.status(),
            signals = outcome.signals().len(),
            total_ms = outcome.total_ms,
            "scan finished"
        );
        Ok(outcome)
    }
}

/// The full 4.1 -> 4.6 pipeline for one symbol. Every failure is folded into
/// the returned report.
async fn process_symbol(
    fetcher: Arc<Fetcher>,
    calendar: ExchangeCalendar,
    settings: AlgorithmSettings,
    interval: Interval,
    lookback: Lookback,
    symbol: Symbol,
) -> SymbolReport {
    let mut timings = SymbolTimings::default();

    let fetch_start = Instant::now();
    let fetched = fetcher.fetch(&symbol, interval, lookback).await;
    timings.fetch_ms = fetch_start.elapsed().as_millis() as u64;

    let series = match fetched {
        Ok(series) => series,
        Err(error) => return SymbolReport::from_error(symbol, &error, timings),
    };

    let algo_start = Instant::now();
    let guard = StalenessGuard::new(calendar, settings.include_extended_hours);
    let freshness = match guard.assess(&series, ZonedDateTime::now_utc()) {
        Ok(freshness) => freshness,
        Err(error) => {
            timings.algorithm_ms = algo_start.elapsed().as_millis() as u64;
            let mut report = SymbolReport::from_error(symbol, &error, timings);
            report.bars_count = series.len();
            report.last_timestamp = series.last_bar().map(|bar| bar.ts);
            return report;
        }
    };

    let validated = match quality::validate(&series) {
        Ok(validated) => validated,
        Err(error) => {
            timings.algorithm_ms = algo_start.elapsed().as_millis() as u64;
            let mut report = SymbolReport::from_error(symbol, &error, timings);
            report.bars_count = series.len();
            report.last_timestamp = series.last_bar().map(|bar| bar.ts);
            report.market_status = Some(freshness.market_status);
            return report;
        }
    };
    let cleaned = validated.series;

    let indicators = IndicatorSet::compute(&cleaned, &settings);

    // Resampling the fetched series keeps the two timeframes aligned; a
    // direct coarse fetch is the fallback when the fine series cannot fill
    // even one confirmation window.
    let mut htf_fetch = Duration::ZERO;
    let htf_series = match resample(&cleaned, settings.higher_timeframe) {
        Ok(resampled) if resampled.len() >= MIN_HTF_BARS => Some(resampled),
        _ => {
            let htf_start = Instant::now();
            let fallback = fetcher
                .fetch(&symbol, settings.higher_timeframe, lookback)
                .await;
            htf_fetch = htf_start.elapsed();
            timings.fetch_ms += htf_fetch.as_millis() as u64;
            match fallback {
                Ok(series) => Some(series),
                Err(error) => {
                    debug!(symbol = %symbol, "higher-timeframe fallback fetch failed: {error}");
                    None
                }
            }
        }
    };

    let htf_context = htf_series.as_ref().and_then(|htf| {
        let htf_indicators = IndicatorSet::compute(htf, &settings);
        let last_ts = cleaned.last_bar().map(|bar| bar.ts)?;
        HtfContext::latest_completed(htf, &htf_indicators, last_ts)
    });

    let evaluator = SignalEvaluator::new(&settings);
    let evaluation = match (cleaned.last_bar(), indicators.last()) {
        (Some(bar), Some(row)) => evaluator.evaluate(&symbol, bar, row, htf_context.as_ref()),
        _ => {
            // Unreachable past the bar-count gate, kept as a guard.
            let error = ScanError::insufficient_bars("no bars survived validation");
            timings.algorithm_ms =
                algo_start.elapsed().saturating_sub(htf_fetch).as_millis() as u64;
            return SymbolReport::from_error(symbol, &error, timings);
        }
    };
    timings.algorithm_ms = algo_start.elapsed().saturating_sub(htf_fetch).as_millis() as u64;

    SymbolReport {
        symbol,
        state: SymbolState::Ok,
        bars_count: cleaned.len(),
        last_timestamp: cleaned.last_bar().map(|bar| bar.ts),
        error_kind: None,
        error: None,
        market_status: Some(freshness.market_status),
        quality_score: validated.quality_score,
        quality_issues: validated.issues,
        indicators: indicators.last().copied(),
        signal: evaluation.signal().cloned(),
        rejection: evaluation.rejection().map(|rejection| rejection.reason()),
        timings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitTable;
    use crate::provider::{MarketDataProvider, ScriptedProvider};
    use crate::retry::RetryPolicy;
    use crate::{Bar, Series};
    use std::future::Future;
    use std::pin::Pin;

    fn symbol(name: &str) -> Symbol {
        Symbol::parse(name).expect("symbol")
    }

    /// A fresh series ending at the current minute, so staleness never
    /// depends on when the test happens to run.
    fn fresh_series(name: &str, len: usize) -> Series {
        let now = ZonedDateTime::now_utc();
        let bars = (0..len)
            .map(|i| {
                let ts = ZonedDateTime::from_offset_datetime(
                    now.into_inner() - time::Duration::minutes((len - 1 - i) as i64),
                );
                let close = 100.0 + i as f64 * 0.01;
                Bar::new(ts, close - 0.005, close + 0.01, close - 0.01, close, 1_000)
                    .expect("bar")
            })
            .collect();
        Series::new(symbol(name), Interval::OneMinute, bars).expect("series")
    }

    fn scanner(provider: Arc<dyn MarketDataProvider>, config: ScannerConfig) -> Scanner {
        let fetcher = Fetcher::new(provider, Arc::new(CircuitTable::default()))
            .with_retry_policy(RetryPolicy::no_retry());
        Scanner::new(
            Arc::new(fetcher),
            ExchangeCalendar::nyse(),
            AlgorithmSettings::default(),
            config,
        )
    }

    #[tokio::test]
    async fn mixed_results_aggregate_to_partial() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_for(&symbol("AAPL"), Ok(fresh_series("AAPL", 150)));
        provider.push_for(
            &symbol("MSFT"),
            Err(ScanError::symbol_not_found("no such listing")),
        );

        let scanner = scanner(provider, ScannerConfig::default());
        let outcome = scanner
            .scan(&[symbol("AAPL"), symbol("MSFT")])
            .await
            .expect("scan must run");

        assert_eq!(outcome.reports.len(), 2);
        assert_eq!(outcome.status(), ScanStatus::Partial);

        let ok = &outcome.reports[0];
        assert_eq!(ok.symbol, symbol("AAPL"));
        assert_eq!(ok.state, SymbolState::Ok);
        assert_eq!(ok.bars_count, 150);
        assert!(ok.indicators.is_some());
        assert!(ok.signal.is_some() || ok.rejection.is_some());

        let failed = &outcome.reports[1];
        assert_eq!(failed.state, SymbolState::ApiError);
        assert_eq!(failed.error_kind, Some(ScanErrorKind::SymbolNotFound));
        assert_eq!(
            outcome.error_counts.get(&ScanErrorKind::SymbolNotFound),
            Some(&1)
        );
    }

    #[tokio::test]
    async fn every_symbol_failing_still_returns_a_formed_outcome() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_for(&symbol("AAA"), Err(ScanError::symbol_not_found("one")));
        provider.push_for(&symbol("BBB"), Err(ScanError::upstream(500, "two")));

        let scanner = scanner(provider, ScannerConfig::default());
        let outcome = scanner
            .scan(&[symbol("AAA"), symbol("BBB")])
            .await
            .expect("scan must run");

        assert_eq!(outcome.status(), ScanStatus::Failed);
        assert_eq!(outcome.reports.len(), 2);
        for report in &outcome.reports {
            assert!(report.error.is_some());
            assert!(report.error_kind.is_some());
        }
    }

    #[tokio::test]
    async fn config_errors_are_fatal_before_any_fetch() {
        let provider = Arc::new(ScriptedProvider::new());
        let scanner = scanner(
            provider.clone(),
            ScannerConfig {
                interval: Interval::FifteenMinutes,
                ..ScannerConfig::default()
            },
        );

        // Default HTF (15m) is not coarser than a 15m scan interval.
        let err = scanner.scan(&[symbol("AAPL")]).await.expect_err("must fail");
        assert!(matches!(err, ConfigError::HigherTimeframeNotCoarser { .. }));
        assert_eq!(provider.call_count(), 0);
    }

    struct HangingProvider;

    impl MarketDataProvider for HangingProvider {
        fn bars<'a>(
            &'a self,
            _req: crate::provider::BarsRequest,
        ) -> Pin<Box<dyn Future<Output = Result<Series, ScanError>> + Send + 'a>> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_reports_pending_symbols_instead_of_dropping_them() {
        let scanner = scanner(
            Arc::new(HangingProvider),
            ScannerConfig {
                deadline: Duration::from_millis(50),
                ..ScannerConfig::default()
            },
        );

        let outcome = scanner.scan(&[symbol("AAPL")]).await.expect("scan must run");
        assert_eq!(outcome.reports.len(), 1);
        let report = &outcome.reports[0];
        assert_eq!(report.state, SymbolState::ApiError);
        assert_eq!(report.error_kind, Some(ScanErrorKind::NetworkTimeout));
        assert!(report
            .error
            .as_deref()
            .is_some_and(|message| message.contains("deadline")));
    }

    #[tokio::test]
    async fn stale_series_is_reported_with_bar_context() {
        // Only meaningful when the market is open at test time; otherwise the
        // closed-market pass-through applies and the symbol reports OK.
        let mut old_series = fresh_series("AAPL", 150);
        for bar in &mut old_series.bars {
            bar.ts = ZonedDateTime::from_offset_datetime(
                bar.ts.into_inner() - time::Duration::hours(1),
            );
        }
        let provider = Arc::new(ScriptedProvider::new());
        let is_open = ExchangeCalendar::nyse()
            .status_at(ZonedDateTime::now_utc())
            .is_open(true);
        provider.push_ok(old_series);
        // The stale path skips indicators, so no fallback HTF fetch happens;
        // the open-market case consumes exactly one scripted response.
        provider.push_ok(fresh_series("AAPL", 150));

        let scanner = scanner(provider, ScannerConfig::default());
        let outcome = scanner.scan(&[symbol("AAPL")]).await.expect("scan must run");

        let report = &outcome.reports[0];
        if is_open {
            assert_eq!(report.state, SymbolState::Stale);
            assert_eq!(report.bars_count, 150);
            assert!(report.last_timestamp.is_some());
        } else {
            assert_eq!(report.state, SymbolState::Ok);
        }
    }
}
