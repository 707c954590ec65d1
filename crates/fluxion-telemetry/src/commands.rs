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

//! Setpoint and SOC-limit commands published onto the message bus

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{TelemetryError, TelemetryResult};
use crate::kind::{Precision, TelemetryKind, TopicMap};
use crate::limits::{LOWER_LIMIT_FIELD, SocLimits, UPPER_LIMIT_FIELD};
use crate::payload::{
    TIMESTAMP_FIELD, UNIT_FIELD, as_object, optional_timestamp, required_number, unit_or_default,
};
use crate::timestamp;
use crate::traits::MessageBusSink;

/// Result of a successful publish, echoed back to the HTTP caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedCommand {
    pub topic: String,
    pub payload: Value,
    pub message: String,
}

pub struct CommandService {
    bus: Arc<dyn MessageBusSink>,
    topics: TopicMap,
}

impl fmt::Debug for CommandService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandService")
            .field("bus", &self.bus.name())
            .field("topics", &self.topics)
            .finish()
    }
}

impl CommandService {
    pub fn new(bus: Arc<dyn MessageBusSink>, topics: TopicMap) -> Self {
        Self { bus, topics }
    }

    pub fn topics(&self) -> &TopicMap {
        &self.topics
    }

    /// Publish a `power`/`charge`/`discharge` (or `SOC`) setpoint on the kind's topic
    pub async fn publish_setpoint(
        &self,
        kind: TelemetryKind,
        body: &Value,
    ) -> TelemetryResult<PublishedCommand> {
        let object = as_object(body)?;
        let field = kind.field_name();
        let value = required_number(object, field)?;
        let unit = unit_or_default(object, kind.default_unit())?;
        let timestamp = timestamp::normalize(optional_timestamp(object)?, Precision::Second)?;

        let mut payload = Map::new();
        payload.insert(field.to_owned(), Value::Number(value.clone()));
        payload.insert(UNIT_FIELD.to_owned(), Value::String(unit.clone()));
        payload.insert(TIMESTAMP_FIELD.to_owned(), Value::String(timestamp.to_string()));

        let topic = self.topics.topic(kind).to_owned();
        let message = format!("{field} set to: {value} {unit}");
        self.publish(topic, Value::Object(payload), message).await
    }

    /// Publish `{"upper_limit": u, "lower_limit": l}` on the SOC limits topic
    pub async fn publish_soc_limits(&self, body: &Value) -> TelemetryResult<PublishedCommand> {
        let object = as_object(body)?;
        let upper = required_number(object, UPPER_LIMIT_FIELD)?;
        let lower = required_number(object, LOWER_LIMIT_FIELD)?;

        let limits = SocLimits {
            upper: upper.as_f64().unwrap_or(f64::NAN),
            lower: lower.as_f64().unwrap_or(f64::NAN),
        };
        limits.validate()?;

        let mut payload = Map::new();
        payload.insert(UPPER_LIMIT_FIELD.to_owned(), Value::Number(upper.clone()));
        payload.insert(LOWER_LIMIT_FIELD.to_owned(), Value::Number(lower.clone()));

        let topic = self.topics.soc_limits.clone();
        let message = format!("SOC limits set: Upper = {upper}, Lower = {lower}");
        self.publish(topic, Value::Object(payload), message).await
    }

    async fn publish(
        &self,
        topic: String,
        payload: Value,
        message: String,
    ) -> TelemetryResult<PublishedCommand> {
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| TelemetryError::InvalidPayload(e.to_string()))?;

        if let Err(e) = self.bus.publish(&topic, bytes).await {
            error!(bus = self.bus.name(), topic = %topic, error = %e, "Failed to publish command");
            return Err(TelemetryError::PublishFailed(format!("{e:#}")));
        }

        info!(topic = %topic, "{message}");
        Ok(PublishedCommand {
            topic,
            payload,
            message,
        })
    }
}
