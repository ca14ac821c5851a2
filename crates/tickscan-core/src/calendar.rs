use serde::{Deserialize, Serialize};
use time::{Date, Time, UtcOffset, Weekday};

use crate::ZonedDateTime;

/// Session phase of the exchange at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    PreMarket,
    Regular,
    AfterHours,
    Closed,
}

impl MarketStatus {
    /// Whether this phase counts as "open" for staleness purposes.
    pub const fn is_open(self, include_extended_hours: bool) -> bool {
        match self {
            Self::Regular => true,
            Self::PreMarket | Self::AfterHours => include_extended_hours,
            Self::Closed => false,
        }
    }
}

/// Trading calendar for one exchange.
///
/// All comparisons happen after normalizing to the exchange's UTC offset.
/// Dates with no session entry (weekends, holidays) are skipped cleanly by
/// the staleness guard, never reported as errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeCalendar {
    offset: UtcOffset,
    extended_open: Time,
    regular_open: Time,
    regular_close: Time,
    extended_close: Time,
    half_day_close: Time,
    holidays: Vec<Date>,
    half_days: Vec<Date>,
}

impl ExchangeCalendar {
    /// US equities calendar: 09:30–16:00 regular, 04:00–20:00 extended,
    /// half-day close at 13:00, US/Eastern standard offset.
    pub fn nyse() -> Self {
        Self {
            offset: UtcOffset::from_hms(-5, 0, 0).expect("static offset"),
            extended_open: Time::from_hms(4, 0, 0).expect("static time"),
            regular_open: Time::from_hms(9, 30, 0).expect("static time"),
            regular_close: Time::from_hms(16, 0, 0).expect("static time"),
            extended_close: Time::from_hms(20, 0, 0).expect("static time"),
            half_day_close: Time::from_hms(13, 0, 0).expect("static time"),
            holidays: Vec::new(),
            half_days: Vec::new(),
        }
    }

    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_holidays(mut self, holidays: Vec<Date>) -> Self {
        self.holidays = holidays;
        self
    }

    pub fn with_half_days(mut self, half_days: Vec<Date>) -> Self {
        self.half_days = half_days;
        self
    }

    pub const fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Whether the exchange holds any session on this date.
    pub fn has_session(&self, date: Date) -> bool {
        let weekend = matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday);
        !weekend && !self.holidays.contains(&date)
    }

    pub fn status_at(&self, at: ZonedDateTime) -> MarketStatus {
        let local = at.to_offset(self.offset);
        let date = local.date();
        if !self.has_session(date) {
            return MarketStatus::Closed;
        }

        let close = if self.half_days.contains(&date) {
            self.half_day_close
        } else {
            self.regular_close
        };

        let now = local.time();
        if now < self.extended_open || now >= self.extended_close {
            MarketStatus::Closed
        } else if now < self.regular_open {
            MarketStatus::PreMarket
        } else if now < close {
            MarketStatus::Regular
        } else {
            MarketStatus::AfterHours
        }
    }
}

impl Default for ExchangeCalendar {
    fn default() -> Self {
        Self::nyse()
    }
}
