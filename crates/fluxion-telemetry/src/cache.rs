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

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

use crate::kind::TelemetryKind;
use crate::timestamp::CanonicalTimestamp;

/// Most recent successfully written value of one telemetry kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestValue {
    pub value: Option<Number>,
    pub unit: String,
    pub timestamp: Option<CanonicalTimestamp>,
}

impl LatestValue {
    fn empty(kind: TelemetryKind) -> Self {
        Self {
            value: None,
            unit: kind.default_unit().to_owned(),
            timestamp: None,
        }
    }
}

/// Advisory "last known value" per telemetry kind.
///
/// Lives for the lifetime of the serving process and is never persisted.
/// Concurrent writers race with last-writer-wins semantics.
#[derive(Debug, Default)]
pub struct LatestValues {
    entries: RwLock<HashMap<TelemetryKind, LatestValue>>,
}

impl LatestValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        kind: TelemetryKind,
        value: Number,
        unit: impl Into<String>,
        timestamp: CanonicalTimestamp,
    ) {
        self.entries.write().insert(
            kind,
            LatestValue {
                value: Some(value),
                unit: unit.into(),
                timestamp: Some(timestamp),
            },
        );
    }

    pub fn get(&self, kind: TelemetryKind) -> LatestValue {
        self.entries
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| LatestValue::empty(kind))
    }

    /// Snapshot keyed by the kind's field name:
    /// `{"power": 42, "unit": "kW", "timestamp": "..."}`
    pub fn snapshot(&self, kind: TelemetryKind) -> Value {
        let latest = self.get(kind);
        let mut map = Map::new();
        map.insert(
            kind.field_name().to_owned(),
            latest.value.map_or(Value::Null, Value::Number),
        );
        map.insert("unit".to_owned(), Value::String(latest.unit));
        map.insert(
            "timestamp".to_owned(),
            latest
                .timestamp
                .map_or(Value::Null, |ts| Value::String(ts.to_string())),
        );
        Value::Object(map)
    }
}
