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

use serde_json::{Map, Number, Value};

use crate::error::{TelemetryError, TelemetryResult};

pub(crate) const UNIT_FIELD: &str = "unit";
pub(crate) const TIMESTAMP_FIELD: &str = "timestamp";

pub(crate) fn as_object(body: &Value) -> TelemetryResult<&Map<String, Value>> {
    body.as_object().ok_or_else(|| {
        TelemetryError::InvalidPayload("request body must be a JSON object".to_owned())
    })
}

pub(crate) fn required_number(object: &Map<String, Value>, field: &str) -> TelemetryResult<Number> {
    match object.get(field) {
        None => Err(TelemetryError::MissingField(field.to_owned())),
        Some(Value::Number(n)) => Ok(n.clone()),
        Some(_) => Err(TelemetryError::invalid_field(field, "expected a number")),
    }
}

pub(crate) fn unit_or_default(object: &Map<String, Value>, default: &str) -> TelemetryResult<String> {
    match object.get(UNIT_FIELD) {
        None | Some(Value::Null) => Ok(default.to_owned()),
        Some(Value::String(unit)) => Ok(unit.clone()),
        Some(_) => Err(TelemetryError::invalid_field(UNIT_FIELD, "expected a string")),
    }
}

/// `null` counts as absent
pub(crate) fn optional_timestamp(object: &Map<String, Value>) -> TelemetryResult<Option<&str>> {
    match object.get(TIMESTAMP_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => Ok(Some(raw.as_str())),
        Some(other) => Err(TelemetryError::InvalidTimestamp {
            input: other.to_string(),
            reason: "expected a string".to_owned(),
        }),
    }
}
