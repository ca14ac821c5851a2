use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation and contract errors exposed by `tickscan-core`.
///
/// These indicate caller bugs or corrupt inputs and are fatal for the
/// operation that raised them; they are never recovered into a per-symbol
/// status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid interval '{value}', expected one of 1m, 5m, 15m, 30m, 1h")]
    InvalidInterval { value: String },
    #[error("invalid lookback '{value}', expected a day count like '7d'")]
    InvalidLookback { value: String },

    #[error("timestamp must be RFC3339: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("series timestamps must be strictly increasing at index {index}")]
    NonMonotonicTimestamps { index: usize },
    #[error("series contains a duplicate timestamp at index {index}")]
    DuplicateTimestamp { index: usize },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be positive")]
    NonPositiveValue { field: &'static str },
    #[error("bar high must be >= max(open, close)")]
    HighBelowBody,
    #[error("bar low must be <= min(open, close)")]
    LowAboveBody,

    #[error("resample target '{target}' must be coarser than source '{source_interval}'")]
    ResampleNotCoarser { source_interval: String, target: String },
}

/// Configuration errors raised before any fetching begins.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("higher timeframe must be coarser than the scan interval '{interval}'")]
    HigherTimeframeNotCoarser { interval: String },
    #[error("scan batch size must be greater than zero")]
    ZeroBatchSize,
    #[error("scan deadline must be greater than zero")]
    ZeroDeadline,
}

/// Per-symbol failure classification.
///
/// Every variant is recovered locally into a symbol report; none escapes the
/// scanner as a panic or a top-level error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanErrorKind {
    PeriodLimitExceeded,
    JsonDecodeError,
    EmptyResponse,
    NetworkTimeout,
    UpstreamError,
    TimezoneMismatch,
    StaleData,
    InsufficientBars,
    InvalidOhlc,
    CircuitBreaker,
    SymbolNotFound,
}

impl ScanErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::PeriodLimitExceeded => "PERIOD_LIMIT_EXCEEDED",
            Self::JsonDecodeError => "JSON_DECODE_ERROR",
            Self::EmptyResponse => "EMPTY_RESPONSE",
            Self::NetworkTimeout => "NETWORK_TIMEOUT",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::TimezoneMismatch => "TIMEZONE_MISMATCH",
            Self::StaleData => "STALE_DATA",
            Self::InsufficientBars => "INSUFFICIENT_BARS",
            Self::InvalidOhlc => "INVALID_OHLC",
            Self::CircuitBreaker => "CIRCUIT_BREAKER",
            Self::SymbolNotFound => "SYMBOL_NOT_FOUND",
        }
    }
}

impl Display for ScanErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Structured per-symbol error used throughout the fetch/validate pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    kind: ScanErrorKind,
    message: String,
    retryable: bool,
}

impl ScanError {
    pub fn new(kind: ScanErrorKind, message: impl Into<String>) -> Self {
        let retryable = matches!(
            kind,
            ScanErrorKind::JsonDecodeError
                | ScanErrorKind::EmptyResponse
                | ScanErrorKind::NetworkTimeout
        );
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn period_limit_exceeded(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::PeriodLimitExceeded, message)
    }

    pub fn json_decode(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::JsonDecodeError, message)
    }

    pub fn empty_response(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::EmptyResponse, message)
    }

    pub fn network_timeout(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::NetworkTimeout, message)
    }

    /// Upstream HTTP failure; `retryable` depends on the status class.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ScanErrorKind::UpstreamError,
            message: message.into(),
            retryable: status == 429 || status >= 500,
        }
    }

    pub fn timezone_mismatch(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::TimezoneMismatch, message)
    }

    pub fn stale_data(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::StaleData, message)
    }

    pub fn insufficient_bars(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::InsufficientBars, message)
    }

    pub fn invalid_ohlc(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::InvalidOhlc, message)
    }

    pub fn circuit_open(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::CircuitBreaker, message)
    }

    pub fn symbol_not_found(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::SymbolNotFound, message)
    }

    pub const fn kind(&self) -> ScanErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind.code())
    }
}

impl std::error::Error for ScanError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_retryable() {
        assert!(ScanError::empty_response("no rows").retryable());
        assert!(ScanError::network_timeout("deadline").retryable());
        assert!(ScanError::json_decode("bad body").retryable());
    }

    #[test]
    fn terminal_kinds_are_not_retryable() {
        assert!(!ScanError::period_limit_exceeded("1m beyond 7d").retryable());
        assert!(!ScanError::symbol_not_found("FAKE").retryable());
        assert!(!ScanError::circuit_open("blacklisted").retryable());
    }

    #[test]
    fn upstream_retryability_follows_status_class() {
        assert!(ScanError::upstream(503, "unavailable").retryable());
        assert!(ScanError::upstream(429, "throttled").retryable());
        assert!(!ScanError::upstream(403, "forbidden").retryable());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ScanErrorKind::PeriodLimitExceeded.code(), "PERIOD_LIMIT_EXCEEDED");
        assert_eq!(ScanErrorKind::CircuitBreaker.code(), "CIRCUIT_BREAKER");
    }
}
