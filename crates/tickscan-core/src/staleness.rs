use serde::{Deserialize, Serialize};

use crate::calendar::{ExchangeCalendar, MarketStatus};
use crate::{ScanError, Series, ZonedDateTime};

/// Outcome of a freshness assessment.
///
/// Outside trading hours the last close is authoritative and the caller is
/// told so through the status flag instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freshness {
    pub market_status: MarketStatus,
}

/// Market-hours staleness guard.
pub struct StalenessGuard {
    calendar: ExchangeCalendar,
    include_extended_hours: bool,
}

impl StalenessGuard {
    pub fn new(calendar: ExchangeCalendar, include_extended_hours: bool) -> Self {
        Self {
            calendar,
            include_extended_hours,
        }
    }

    /// Assess whether the series is current enough to trust at `now`.
    ///
    /// Timestamps are normalized to the exchange offset before comparison;
    /// a series mixing offsets is rejected rather than guessed at.
    pub fn assess(&self, series: &Series, now: ZonedDateTime) -> Result<Freshness, ScanError> {
        let last = series.last_bar().ok_or_else(|| {
            ScanError::empty_response(format!("no bars to assess for '{}'", series.symbol))
        })?;

        if series.uniform_offset().is_none() {
            return Err(ScanError::timezone_mismatch(format!(
                "series for '{}' mixes UTC offsets",
                series.symbol
            )));
        }

        let market_status = self.calendar.status_at(now);
        if market_status.is_open(self.include_extended_hours) {
            let last_local = last.ts.to_offset(self.calendar.offset());
            let age = now.to_offset(self.calendar.offset()).since(last_local);
            let allowance = series.interval.staleness_allowance();
            if age > allowance {
                return Err(ScanError::stale_data(format!(
                    "last {} bar is {}s old, allowance is {}s while the market is open",
                    series.interval,
                    age.whole_seconds(),
                    allowance.whole_seconds(),
                )));
            }
        }

        Ok(Freshness { market_status })
    }
}
