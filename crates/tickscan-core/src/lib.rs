//! Core pipeline for tickscan.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - The market-data fetch pipeline: lookback ceilings, retry, circuit breaker
//! - Staleness and data-quality guards
//! - The resampler, indicator engine and signal evaluator
//! - The per-symbol scan orchestrator
//!
//! Persistence, HTTP service surfaces and UI rendering are external
//! collaborators; they call [`Scanner::scan`] and consume the returned
//! [`ScanOutcome`].

pub mod calendar;
pub mod circuit_breaker;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod indicators;
pub mod provider;
pub mod quality;
pub mod resample;
pub mod retry;
pub mod scanner;
pub mod settings;
pub mod signal;
pub mod staleness;

pub use calendar::{ExchangeCalendar, MarketStatus};
pub use circuit_breaker::{CircuitBreakerConfig, CircuitDecision, CircuitState, CircuitTable};
pub use domain::{Bar, BarDefect, Interval, Lookback, Series, Symbol, ZonedDateTime};
pub use error::{ConfigError, ScanError, ScanErrorKind, ValidationError};
pub use fetcher::Fetcher;
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient};
pub use indicators::{IndicatorRow, IndicatorSet, Trend};
pub use provider::{BarsRequest, ChartApiProvider, MarketDataProvider, ScriptedProvider};
pub use quality::{QualityIssue, ValidationReport};
pub use resample::resample;
pub use retry::RetryPolicy;
pub use scanner::{
    ScanOutcome, ScanStatus, Scanner, ScannerConfig, SymbolReport, SymbolState, SymbolTimings,
};
pub use settings::AlgorithmSettings;
pub use signal::{Direction, Evaluation, Gate, HtfContext, Rejection, Signal, SignalEvaluator};
pub use staleness::{Freshness, StalenessGuard};
