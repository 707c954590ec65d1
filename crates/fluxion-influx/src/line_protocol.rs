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

//! Line protocol encoding for single-field points

use fluxion_telemetry::TelemetryPoint;

use crate::errors::{InfluxError, InfluxResult};

/// Encode `measurement field=value <ns>`.
///
/// Values are always written as floats so that integer and fractional
/// writes of the same field never collide on the column type.
pub fn encode_point(point: &TelemetryPoint) -> InfluxResult<String> {
    let value = point
        .value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InfluxError::InvalidPoint(format!("value {} is not a finite float", point.value)))?;

    let nanos = point
        .timestamp
        .as_datetime()
        .timestamp_nanos_opt()
        .ok_or_else(|| {
            InfluxError::InvalidPoint(format!("timestamp {} is out of range", point.timestamp))
        })?;

    if point.measurement.is_empty() || point.field.is_empty() {
        return Err(InfluxError::InvalidPoint(
            "measurement and field must not be empty".to_owned(),
        ));
    }

    Ok(format!(
        "{} {}={} {}",
        escape_measurement(&point.measurement),
        escape_key(&point.field),
        format_float(value),
        nanos
    ))
}

fn format_float(value: f64) -> String {
    let mut formatted = value.to_string();
    if !formatted.contains(['.', 'e', 'E']) {
        formatted.push_str(".0");
    }
    formatted
}

fn escape_measurement(name: &str) -> String {
    escape(name, &[',', ' '])
}

fn escape_key(key: &str) -> String {
    escape(key, &[',', '=', ' '])
}

fn escape(input: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fluxion_telemetry::CanonicalTimestamp;
    use serde_json::Number;

    fn point(measurement: &str, field: &str, value: Number) -> TelemetryPoint {
        TelemetryPoint {
            measurement: measurement.to_owned(),
            field: field.to_owned(),
            value,
            timestamp: CanonicalTimestamp::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_integer_value_written_as_float() {
        let line = encode_point(&point("battery_data", "power", Number::from(42))).unwrap();
        assert_eq!(line, "battery_data power=42.0 1735689600000000000");
    }

    #[test]
    fn test_fractional_value() {
        let value = Number::from_f64(3.25).unwrap();
        let line = encode_point(&point("battery_data", "SOC", value)).unwrap();
        assert_eq!(line, "battery_data SOC=3.25 1735689600000000000");
    }

    #[test]
    fn test_escaping() {
        let line = encode_point(&point("my battery,a", "f=x y", Number::from(1))).unwrap();
        assert_eq!(line, r"my\ battery\,a f\=x\ y=1.0 1735689600000000000");
    }

    #[test]
    fn test_empty_field_rejected() {
        let err = encode_point(&point("battery_data", "", Number::from(1))).unwrap_err();
        assert!(matches!(err, InfluxError::InvalidPoint(_)));
    }
}
