//! Slack message timestamps.
//!
//! Slack identifies a message within a channel by its `ts`, a string of the
//! form `"1700000000.000100"` (seconds, then six digits of microseconds).
//! The crawler uses the same value as its per-channel watermark and as the
//! continuation cursor for history pages, so it is kept as an integer number
//! of microseconds to make ordering exact.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MICROS_PER_SEC: i64 = 1_000_000;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct MessageTs(i64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid message timestamp: {0:?}")]
pub struct InvalidMessageTs(pub String);

impl MessageTs {
    pub const ZERO: MessageTs = MessageTs(0);

    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs * MICROS_PER_SEC)
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_micros())
    }

    pub fn as_micros(&self) -> i64 {
        self.0
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.0)
    }
}

impl fmt::Display for MessageTs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}",
            self.0.div_euclid(MICROS_PER_SEC),
            self.0.rem_euclid(MICROS_PER_SEC)
        )
    }
}

impl FromStr for MessageTs {
    type Err = InvalidMessageTs;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidMessageTs(s.to_string());
        let (secs, frac) = match s.split_once('.') {
            Some((secs, frac)) => (secs, frac),
            None => (s, ""),
        };

        if secs.is_empty() || frac.len() > 6 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let secs: i64 = secs.parse().map_err(|_| invalid())?;
        let micros: i64 = if frac.is_empty() {
            0
        } else {
            // "0001" means 100 microseconds, so pad on the right
            format!("{frac:0<6}").parse().map_err(|_| invalid())?
        };

        secs.checked_mul(MICROS_PER_SEC)
            .and_then(|s| s.checked_add(micros))
            .map(MessageTs)
            .ok_or_else(invalid)
    }
}

impl TryFrom<String> for MessageTs {
    type Error = InvalidMessageTs;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MessageTs> for String {
    fn from(ts: MessageTs) -> Self {
        ts.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_slack_format() {
        let ts: MessageTs = "1700000000.000100".parse().unwrap();
        assert_eq!(ts.as_micros(), 1_700_000_000_000_100);
        assert_eq!(ts.to_string(), "1700000000.000100");
    }

    #[test]
    fn short_fraction_is_right_padded() {
        let ts: MessageTs = "12.5".parse().unwrap();
        assert_eq!(ts.as_micros(), 12_500_000);
        assert_eq!(ts.to_string(), "12.500000");
    }

    #[test]
    fn whole_seconds_are_accepted() {
        assert_eq!("30".parse::<MessageTs>().unwrap(), MessageTs::from_secs(30));
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<MessageTs>().is_err());
        assert!("abc".parse::<MessageTs>().is_err());
        assert!("1.1234567".parse::<MessageTs>().is_err());
        assert!("1.-5".parse::<MessageTs>().is_err());
    }

    #[test]
    fn orders_by_micros() {
        let a: MessageTs = "1700000000.000100".parse().unwrap();
        let b: MessageTs = "1700000000.000099".parse().unwrap();
        assert!(a > b);
    }

    #[test]
    fn serializes_as_string() {
        let ts = MessageTs::from_secs(20);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"20.000000\"");
        let back: MessageTs = serde_json::from_str("\"20.000000\"").unwrap();
        assert_eq!(back, ts);
    }
}
