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

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Number, Value};

use crate::timestamp::CanonicalTimestamp;

// ============= Time-Series Sink =============

/// One point written to the time-series store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryPoint {
    pub measurement: String,
    pub field: String,
    pub value: Number,
    pub timestamp: CanonicalTimestamp,
}

/// Range expressions in the store's native syntax (e.g. `-1h`, `now()`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub measurement: String,
    pub start: String,
    pub stop: String,
}

/// One field value returned by a range query
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub time: DateTime<Utc>,
    pub field: String,
    pub value: f64,
}

/// Durable time-series storage (InfluxDB in production)
#[async_trait]
pub trait TimeSeriesSink: Send + Sync {
    /// Persist a single point; one call produces one point, no deduplication
    async fn write_point(&self, point: &TelemetryPoint) -> Result<()>;

    /// Fetch every field record of the measurement within the range
    async fn query_range(&self, range: &TimeRange) -> Result<Vec<FieldRecord>>;

    /// Name of the sink for logging
    fn name(&self) -> &str;
}

// ============= Message Bus Sink =============

/// Publish side of the message bus (MQTT in production)
#[async_trait]
pub trait MessageBusSink: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    fn name(&self) -> &str;
}

// ============= Telemetry Forwarder =============

/// Delivers a write payload to a telemetry write endpoint (HTTP in production)
#[async_trait]
pub trait TelemetryForwarder: Send + Sync {
    /// `path` is relative to the forwarder's base, e.g. `/write/charge`
    async fn forward(&self, path: &str, payload: &Value) -> Result<()>;
}
