use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::Symbol;

/// Circuit thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures within `failure_window` that open the circuit.
    pub failure_threshold: u32,
    /// Sliding window over which failures are counted.
    pub failure_window: Duration,
    /// How long an opened circuit blacklists the symbol.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_window: Duration::from_secs(5 * 60),
            cooldown: Duration::from_secs(15 * 60),
        }
    }
}

/// Observable per-symbol circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Counting,
    Open,
}

/// Whether a fetch may be dispatched for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitDecision {
    Allow,
    Open { remaining: Duration },
}

#[derive(Debug, Default)]
struct CircuitEntry {
    failures: Vec<Instant>,
    open_until: Option<Instant>,
}

/// Process-wide per-symbol circuit table.
///
/// The only cross-task shared mutable state in the pipeline. Owned by the
/// scanner's construction scope and passed by handle to the fetcher, so test
/// scans get isolated tables rather than touching a hidden global.
#[derive(Debug)]
pub struct CircuitTable {
    config: CircuitBreakerConfig,
    entries: Mutex<HashMap<Symbol, CircuitEntry>>,
}

impl Default for CircuitTable {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitTable {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a fetch may proceed. An expired blacklist resets the
    /// symbol back to closed as part of the check.
    pub fn check(&self, symbol: &Symbol) -> CircuitDecision {
        let mut entries = self
            .entries
            .lock()
            .expect("circuit table lock is not poisoned");

        let Some(entry) = entries.get_mut(symbol) else {
            return CircuitDecision::Allow;
        };

        if let Some(open_until) = entry.open_until {
            let now = Instant::now();
            if now < open_until {
                return CircuitDecision::Open {
                    remaining: open_until - now,
                };
            }
            entries.remove(symbol);
        }

        CircuitDecision::Allow
    }

    /// Record one failed fetch call. Failures older than the window are
    /// discarded before counting.
    pub fn record_failure(&self, symbol: &Symbol) {
        let mut entries = self
            .entries
            .lock()
            .expect("circuit table lock is not poisoned");

        let entry = entries.entry(symbol.clone()).or_default();
        let now = Instant::now();
        entry
            .failures
            .retain(|at| now.duration_since(*at) <= self.config.failure_window);
        entry.failures.push(now);

        if entry.failures.len() as u32 >= self.config.failure_threshold {
            entry.open_until = Some(now + self.config.cooldown);
            entry.failures.clear();
        }
    }

    /// A successful fetch resets the symbol immediately.
    pub fn record_success(&self, symbol: &Symbol) {
        self.entries
            .lock()
            .expect("circuit table lock is not poisoned")
            .remove(symbol);
    }

    pub fn state(&self, symbol: &Symbol) -> CircuitState {
        let entries = self
            .entries
            .lock()
            .expect("circuit table lock is not poisoned");

        match entries.get(symbol) {
            None => CircuitState::Closed,
            Some(entry) => match entry.open_until {
                Some(open_until) if Instant::now() < open_until => CircuitState::Open,
                Some(_) => CircuitState::Closed,
                None => CircuitState::Counting,
            },
        }
    }
}
