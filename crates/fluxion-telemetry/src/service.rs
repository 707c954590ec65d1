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

//! Telemetry write and read pipeline

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::cache::LatestValues;
use crate::error::{TelemetryError, TelemetryResult};
use crate::kind::TelemetryKind;
use crate::payload::{as_object, optional_timestamp, required_number, unit_or_default};
use crate::timestamp::{self, CanonicalTimestamp};
use crate::traits::{FieldRecord, TelemetryPoint, TimeRange, TimeSeriesSink};

pub const DEFAULT_MEASUREMENT: &str = "battery_data";

/// Range applied when a read request omits `begin` or `end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadDefaults {
    pub begin: String,
    pub end: String,
}

impl Default for ReadDefaults {
    fn default() -> Self {
        Self {
            begin: "-1h".to_owned(),
            end: "now()".to_owned(),
        }
    }
}

/// One reshaped read row: `{"time": "...", "SOC": null, "power": 42.0, ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingRow {
    pub time: CanonicalTimestamp,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Option<f64>>,
}

pub struct TelemetryService {
    sink: Arc<dyn TimeSeriesSink>,
    cache: Arc<LatestValues>,
    measurement: String,
    read_defaults: ReadDefaults,
}

impl fmt::Debug for TelemetryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryService")
            .field("sink", &self.sink.name())
            .field("measurement", &self.measurement)
            .field("read_defaults", &self.read_defaults)
            .finish_non_exhaustive()
    }
}

impl TelemetryService {
    pub fn new(
        sink: Arc<dyn TimeSeriesSink>,
        cache: Arc<LatestValues>,
        measurement: impl Into<String>,
        read_defaults: ReadDefaults,
    ) -> Self {
        Self {
            sink,
            cache,
            measurement: measurement.into(),
            read_defaults,
        }
    }

    pub fn cache(&self) -> &Arc<LatestValues> {
        &self.cache
    }

    /// Validate, timestamp, persist and cache one reading.
    ///
    /// All-or-nothing: a validation or sink failure leaves both the sink
    /// and the cache untouched.
    pub async fn write(&self, kind: TelemetryKind, body: &Value) -> TelemetryResult<TelemetryPoint> {
        let object = as_object(body)?;
        let field = kind.field_name();
        let value = required_number(object, field)?;
        let unit = unit_or_default(object, kind.default_unit())?;
        let timestamp = timestamp::normalize(optional_timestamp(object)?, kind.precision())?;

        let point = TelemetryPoint {
            measurement: self.measurement.clone(),
            field: field.to_owned(),
            value,
            timestamp,
        };

        if let Err(e) = self.sink.write_point(&point).await {
            error!(sink = self.sink.name(), kind = %kind, error = %e, "Failed to write telemetry point");
            return Err(TelemetryError::SinkUnavailable(format!("{e:#}")));
        }

        self.cache
            .record(kind, point.value.clone(), unit, point.timestamp);
        debug!(kind = %kind, value = %point.value, timestamp = %point.timestamp, "Telemetry written");
        Ok(point)
    }

    /// Resolve the range, applying defaults for absent or empty bounds
    pub fn resolve_range(&self, begin: Option<&str>, end: Option<&str>) -> TelemetryResult<TimeRange> {
        let start = pick(begin, &self.read_defaults.begin);
        let stop = pick(end, &self.read_defaults.end);
        validate_range_expr(&start)?;
        validate_range_expr(&stop)?;

        Ok(TimeRange {
            measurement: self.measurement.clone(),
            start,
            stop,
        })
    }

    pub async fn read(&self, begin: Option<&str>, end: Option<&str>) -> TelemetryResult<Vec<ReadingRow>> {
        let range = self.resolve_range(begin, end)?;
        info!(start = %range.start, stop = %range.stop, "Querying telemetry range");

        let records = self.sink.query_range(&range).await.map_err(|e| {
            error!(sink = self.sink.name(), error = %e, "Telemetry range query failed");
            TelemetryError::SinkUnavailable(format!("{e:#}"))
        })?;

        Ok(reshape(records))
    }
}

fn pick(requested: Option<&str>, default: &str) -> String {
    requested
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_owned()
}

/// Range expressions are spliced into the store query, so only the
/// characters of durations, timestamps and `now()` are allowed
pub fn validate_range_expr(expr: &str) -> TelemetryResult<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ':' | '+' | '-' | '.' | '_' | '(' | ')');
    if expr.is_empty() || !expr.chars().all(allowed) {
        return Err(TelemetryError::InvalidRange(expr.to_owned()));
    }
    Ok(())
}

/// One output row per record, rectangular across all known fields,
/// ordered oldest-first
pub fn reshape(mut records: Vec<FieldRecord>) -> Vec<ReadingRow> {
    records.sort_by_key(|r| r.time);
    records
        .into_iter()
        .map(|record| {
            let mut fields: BTreeMap<String, Option<f64>> = TelemetryKind::all()
                .iter()
                .map(|kind| (kind.field_name().to_owned(), None))
                .collect();
            fields.insert(record.field, Some(record.value));
            ReadingRow {
                time: CanonicalTimestamp::new(record.time),
                fields,
            }
        })
        .collect()
}
