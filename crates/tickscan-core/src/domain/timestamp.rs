use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime, Time, UtcOffset};

use crate::ValidationError;

/// RFC3339 timestamp carrying an explicit exchange offset.
///
/// Unlike a plain instant, the offset is part of the value: staleness and
/// session checks normalize every bar to the exchange's local offset before
/// comparing, and a series mixing offsets is rejected upstream. Ordering and
/// equality compare the underlying instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZonedDateTime(OffsetDateTime);

impl ZonedDateTime {
    pub fn now_utc() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        OffsetDateTime::parse(input, &Rfc3339)
            .map(Self)
            .map_err(|_| ValidationError::InvalidTimestamp {
                value: input.to_owned(),
            })
    }

    /// Build from provider epoch seconds, pinned to the exchange offset.
    pub fn from_unix_with_offset(secs: i64, offset: UtcOffset) -> Result<Self, ValidationError> {
        let instant = OffsetDateTime::from_unix_timestamp(secs).map_err(|_| {
            ValidationError::InvalidTimestamp {
                value: secs.to_string(),
            }
        })?;
        Ok(Self(instant.to_offset(offset)))
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Self {
        Self(value)
    }

    pub const fn offset(self) -> UtcOffset {
        self.0.offset()
    }

    pub fn to_offset(self, offset: UtcOffset) -> Self {
        Self(self.0.to_offset(offset))
    }

    pub const fn unix_timestamp(self) -> i64 {
        self.0.unix_timestamp()
    }

    pub const fn date(self) -> Date {
        self.0.date()
    }

    pub const fn time(self) -> Time {
        self.0.time()
    }

    pub const fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// Signed duration from `earlier` to `self`.
    pub fn since(self, earlier: Self) -> time::Duration {
        self.0 - earlier.0
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .expect("ZonedDateTime must be RFC3339 formattable")
    }
}

impl Display for ZonedDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for ZonedDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for ZonedDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}
