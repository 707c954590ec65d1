// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Timestamp normalization
//!
//! Caller-supplied timestamps are parsed leniently and kept exact. Missing
//! timestamps are synthesized from the current UTC time and truncated to
//! the precision of the telemetry kind, so periodic samples fall on the
//! same bucket boundaries in the time-series store.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::{TelemetryError, TelemetryResult};
use crate::kind::Precision;

/// Offset-carrying formats tried after RFC 3339
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Naive formats, interpreted as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A UTC instant rendered as ISO-8601 with a `Z` suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalTimestamp(DateTime<Utc>);

impl CanonicalTimestamp {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for CanonicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl Serialize for CanonicalTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<DateTime<Utc>> for CanonicalTimestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }
}

/// Normalize an optional timestamp against the current wall clock
pub fn normalize(raw: Option<&str>, precision: Precision) -> TelemetryResult<CanonicalTimestamp> {
    normalize_at(raw, precision, Utc::now())
}

/// Normalize an optional timestamp against a given `now`
pub fn normalize_at(
    raw: Option<&str>,
    precision: Precision,
    now: DateTime<Utc>,
) -> TelemetryResult<CanonicalTimestamp> {
    match raw {
        Some(input) => parse_timestamp(input).map(CanonicalTimestamp),
        None => Ok(CanonicalTimestamp(truncate(now, precision))),
    }
}

/// Parse an ISO-8601-like date-time string into UTC
///
/// Instants the time-series store cannot hold as nanoseconds since the
/// epoch (before 1677-09-21 or after 2262-04-11) are rejected here.
pub fn parse_timestamp(input: &str) -> TelemetryResult<DateTime<Utc>> {
    let instant = parse_instant(input)?;
    if instant.timestamp_nanos_opt().is_none() {
        return Err(invalid(
            input,
            "outside the representable range 1677-09-21 to 2262-04-11",
        ));
    }
    Ok(instant)
}

fn parse_instant(input: &str) -> TelemetryResult<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid(input, "timestamp is empty"));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(trimmed, format) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }

    // A trailing Z on an otherwise naive string still means UTC
    let naive_input = trimmed
        .strip_suffix('Z')
        .or_else(|| trimmed.strip_suffix('z'))
        .unwrap_or(trimmed);
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive_input, format) {
            return Ok(parsed.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(naive_input, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight.and_utc());
    }

    Err(invalid(input, "unrecognized date-time format"))
}

/// Zero out the components below the requested precision
pub fn truncate(instant: DateTime<Utc>, precision: Precision) -> DateTime<Utc> {
    let without_fraction = instant.with_nanosecond(0).unwrap_or(instant);
    match precision {
        Precision::Second => without_fraction,
        Precision::Minute => without_fraction.with_second(0).unwrap_or(without_fraction),
    }
}

fn invalid(input: &str, reason: &str) -> TelemetryError {
    TelemetryError::InvalidTimestamp {
        input: input.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 17, 14, 23, 47).unwrap()
            + chrono::Duration::milliseconds(512)
    }

    #[test]
    fn test_absent_minute_precision_zeroes_seconds() {
        let ts = normalize_at(None, Precision::Minute, fixed_now()).unwrap();
        assert_eq!(ts.to_string(), "2025-10-17T14:23:00Z");
    }

    #[test]
    fn test_absent_second_precision_zeroes_fraction_only() {
        let ts = normalize_at(None, Precision::Second, fixed_now()).unwrap();
        assert_eq!(ts.to_string(), "2025-10-17T14:23:47Z");
    }

    #[test]
    fn test_explicit_timestamp_is_kept_exactly() {
        let ts = normalize_at(
            Some("2025-01-02T03:04:05.250Z"),
            Precision::Minute,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(ts.to_string(), "2025-01-02T03:04:05.250Z");
    }

    #[test]
    fn test_offsets_are_converted_to_utc() {
        let ts = parse_timestamp("2025-06-01T12:00:00+02:00").unwrap();
        assert_eq!(CanonicalTimestamp::new(ts).to_string(), "2025-06-01T10:00:00Z");

        let compact = parse_timestamp("2025-06-01T12:00:00+0200").unwrap();
        assert_eq!(compact, ts);
    }

    #[test]
    fn test_naive_and_date_only_inputs_are_utc() {
        let naive = parse_timestamp("2025-06-01 08:30:00").unwrap();
        assert_eq!(CanonicalTimestamp::new(naive).to_string(), "2025-06-01T08:30:00Z");

        let no_seconds = parse_timestamp("2025-06-01T08:30").unwrap();
        assert_eq!(no_seconds, naive);

        let with_z = parse_timestamp("2025-06-01T08:30:00Z").unwrap();
        assert_eq!(with_z, naive);

        let date = parse_timestamp("2025-06-01").unwrap();
        assert_eq!(CanonicalTimestamp::new(date).to_string(), "2025-06-01T00:00:00Z");
    }

    #[test]
    fn test_garbage_is_rejected() {
        for input in ["", "   ", "yesterday", "2025-13-01T00:00:00Z", "12:00"] {
            let err = normalize_at(Some(input), Precision::Minute, fixed_now()).unwrap_err();
            assert!(
                matches!(err, TelemetryError::InvalidTimestamp { .. }),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_instants_beyond_nanosecond_range_are_rejected() {
        for input in ["2300-01-01T00:00:00Z", "1600-01-01", "2262-04-12T00:00:00Z"] {
            let err = parse_timestamp(input).unwrap_err();
            assert!(
                matches!(err, TelemetryError::InvalidTimestamp { ref reason, .. } if reason.contains("range")),
                "{input:?} should be rejected, got {err:?}"
            );
        }

        let edge = parse_timestamp("2262-04-11T00:00:00Z").unwrap();
        assert!(edge.timestamp_nanos_opt().is_some());
    }

    #[test]
    fn test_serializes_as_string() {
        let ts = CanonicalTimestamp::new(fixed_now());
        let json = serde_json::to_value(ts).unwrap();
        assert_eq!(json, serde_json::json!("2025-10-17T14:23:47.512Z"));
    }
}
