//! Timestamp normalisation.
//!
//! Posts arrive with `createdAt` values in several shapes: RFC 3339 with an
//! offset, naive ISO 8601 date-times, or bare dates. Everything is normalised
//! to UTC; values without an offset are taken to already be UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

use crate::{Error, Result};

const NAIVE_FORMATS: &[&str] = &[
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
];

/// Parse a timestamp string into UTC.
pub fn parse_utc(s: &str) -> Result<DateTime<Utc>> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  for fmt in NAIVE_FORMATS {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
      return Ok(naive.and_utc());
    }
  }
  if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
    && let Some(naive) = date.and_hms_opt(0, 0, 0)
  {
    return Ok(naive.and_utc());
  }
  Err(Error::InvalidTimestamp(s.to_owned()))
}

/// Fixed-precision RFC 3339 rendering; lexical order equals time order.
pub fn format_utc(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `serde(deserialize_with)` adapter around [`parse_utc`].
pub fn deserialize_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = String::deserialize(deserializer)?;
  parse_utc(&raw).map_err(serde::de::Error::custom)
}

/// `serde(serialize_with)` adapter around [`format_utc`].
pub fn serialize_utc<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
  S: Serializer,
{
  serializer.serialize_str(&format_utc(*dt))
}
