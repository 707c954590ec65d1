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

//! In-memory sinks for tests

use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::traits::{
    FieldRecord, MessageBusSink, TelemetryForwarder, TelemetryPoint, TimeRange, TimeSeriesSink,
};

/// Records every point and range query; returns canned records
#[derive(Debug, Default)]
pub struct RecordingSink {
    points: Mutex<Vec<TelemetryPoint>>,
    ranges: Mutex<Vec<TimeRange>>,
    records: Mutex<Vec<FieldRecord>>,
    failure: Mutex<Option<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<FieldRecord>) -> Self {
        let sink = Self::default();
        *sink.records.lock() = records;
        sink
    }

    /// Make every subsequent call fail with `message`
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_owned());
    }

    pub fn points(&self) -> Vec<TelemetryPoint> {
        self.points.lock().clone()
    }

    pub fn ranges(&self) -> Vec<TimeRange> {
        self.ranges.lock().clone()
    }
}

#[async_trait]
impl TimeSeriesSink for RecordingSink {
    async fn write_point(&self, point: &TelemetryPoint) -> Result<()> {
        if let Some(message) = self.failure.lock().clone() {
            bail!(message);
        }
        self.points.lock().push(point.clone());
        Ok(())
    }

    async fn query_range(&self, range: &TimeRange) -> Result<Vec<FieldRecord>> {
        if let Some(message) = self.failure.lock().clone() {
            bail!(message);
        }
        self.ranges.lock().push(range.clone());
        Ok(self.records.lock().clone())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[derive(Debug, Default)]
pub struct RecordingBus {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_owned());
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl MessageBusSink for RecordingBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        if let Some(message) = self.failure.lock().clone() {
            bail!(message);
        }
        self.published.lock().push((topic.to_owned(), payload));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[derive(Debug, Default)]
pub struct RecordingForwarder {
    calls: Mutex<Vec<(String, Value)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_owned());
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TelemetryForwarder for RecordingForwarder {
    async fn forward(&self, path: &str, payload: &Value) -> Result<()> {
        self.calls.lock().push((path.to_owned(), payload.clone()));
        if let Some(message) = self.failure.lock().clone() {
            bail!(message);
        }
        Ok(())
    }
}
