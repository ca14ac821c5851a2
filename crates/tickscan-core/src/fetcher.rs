use std::sync::Arc;

use tracing::{debug, warn};

use crate::circuit_breaker::{CircuitDecision, CircuitTable};
use crate::provider::{BarsRequest, MarketDataProvider};
use crate::retry::RetryPolicy;
use crate::{Interval, Lookback, ScanError, Series, Symbol};

/// Market-data fetcher.
///
/// Enforces the per-interval lookback ceiling before any network call,
/// always requests extended-hours rows and provider-side repair, and drives
/// the retry schedule for transient failures. One fetch call runs its
/// attempts sequentially; concurrency happens across symbols, never within
/// one.
pub struct Fetcher {
    provider: Arc<dyn MarketDataProvider>,
    circuits: Arc<CircuitTable>,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(provider: Arc<dyn MarketDataProvider>, circuits: Arc<CircuitTable>) -> Self {
        Self {
            provider,
            circuits,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn circuits(&self) -> &Arc<CircuitTable> {
        &self.circuits
    }

    pub async fn fetch(
        &self,
        symbol: &Symbol,
        interval: Interval,
        lookback: Lookback,
    ) -> Result<Series, ScanError> {
        if lookback.exceeds_ceiling(interval) {
            return Err(ScanError::period_limit_exceeded(format!(
                "lookback {} exceeds the {}-day ceiling for interval {}",
                lookback,
                interval.max_lookback_days(),
                interval,
            )));
        }

        if let CircuitDecision::Open { remaining } = self.circuits.check(symbol) {
            return Err(ScanError::circuit_open(format!(
                "'{symbol}' is blacklisted for {}s after repeated fetch failures",
                remaining.as_secs(),
            )));
        }

        let mut attempt = 0;
        loop {
            let request = BarsRequest::new(symbol.clone(), interval, lookback);
            let error = match self.provider.bars(request).await {
                Ok(series) if series.is_empty() => {
                    ScanError::empty_response(format!("provider returned no rows for '{symbol}'"))
                }
                Ok(series) => {
                    self.circuits.record_success(symbol);
                    return Ok(series);
                }
                Err(error) => error,
            };

            if error.retryable() && self.retry.retries_remaining(attempt) {
                let delay = self.retry.jittered_delay(attempt);
                debug!(
                    symbol = %symbol,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    kind = %error.kind(),
                    "transient fetch failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            warn!(symbol = %symbol, kind = %error.kind(), "fetch failed: {}", error.message());
            self.circuits.record_failure(symbol);
            return Err(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedProvider;
    use crate::{Bar, ScanErrorKind, ZonedDateTime};

    fn symbol() -> Symbol {
        Symbol::parse("AAPL").expect("symbol")
    }

    fn one_bar_series() -> Series {
        let ts = ZonedDateTime::parse("2024-03-04T09:30:00-05:00").expect("timestamp");
        let bar = Bar::new(ts, 10.0, 10.5, 9.9, 10.2, 1_000).expect("bar");
        Series::new(symbol(), Interval::OneMinute, vec![bar]).expect("series")
    }

    fn fetcher(provider: Arc<ScriptedProvider>) -> Fetcher {
        Fetcher::new(provider, Arc::new(CircuitTable::default()))
    }

    #[tokio::test]
    async fn lookback_beyond_ceiling_fails_without_a_provider_call() {
        let provider = Arc::new(ScriptedProvider::new());
        let fetcher = fetcher(provider.clone());

        let err = fetcher
            .fetch(&symbol(), Interval::OneMinute, Lookback::days(10))
            .await
            .expect_err("must fail");

        assert_eq!(err.kind(), ScanErrorKind::PeriodLimitExceeded);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_err(ScanError::empty_response("first"));
        provider.push_err(ScanError::network_timeout("second"));
        provider.push_ok(one_bar_series());
        let fetcher = fetcher(provider.clone());

        let series = fetcher
            .fetch(&symbol(), Interval::OneMinute, Lookback::days(5))
            .await
            .expect("third attempt must succeed");

        assert_eq!(series.len(), 1);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_capped_at_three() {
        let provider = Arc::new(ScriptedProvider::new());
        for _ in 0..5 {
            provider.push_err(ScanError::empty_response("still empty"));
        }
        let fetcher = fetcher(provider.clone());

        let err = fetcher
            .fetch(&symbol(), Interval::OneMinute, Lookback::days(5))
            .await
            .expect_err("must fail after three attempts");

        assert_eq!(err.kind(), ScanErrorKind::EmptyResponse);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn terminal_failures_are_not_retried() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_err(ScanError::symbol_not_found("no such listing"));
        let fetcher = fetcher(provider.clone());

        let err = fetcher
            .fetch(&symbol(), Interval::OneMinute, Lookback::days(5))
            .await
            .expect_err("must fail");

        assert_eq!(err.kind(), ScanErrorKind::SymbolNotFound);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn open_circuit_short_circuits_before_the_network() {
        let provider = Arc::new(ScriptedProvider::new());
        for _ in 0..3 {
            provider.push_err(ScanError::upstream(403, "forbidden"));
        }
        let fetcher = fetcher(provider.clone());

        for _ in 0..3 {
            let _ = fetcher
                .fetch(&symbol(), Interval::OneMinute, Lookback::days(5))
                .await;
        }
        assert_eq!(provider.call_count(), 3);

        let err = fetcher
            .fetch(&symbol(), Interval::OneMinute, Lookback::days(5))
            .await
            .expect_err("must short-circuit");

        assert_eq!(err.kind(), ScanErrorKind::CircuitBreaker);
        assert_eq!(provider.call_count(), 3);
    }
}
