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
use fluxion_telemetry::MessageBusSink;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{MqttError, MqttResult};

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id_prefix: String,
    pub keep_alive: Duration,
    pub publish_timeout: Duration,
    /// Bound of the request queue between client handles and the event loop
    pub channel_capacity: usize,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "mqtt-broker".to_owned(),
            port: 1883,
            client_id_prefix: "fluxion-gateway".to_owned(),
            keep_alive: Duration::from_secs(60),
            publish_timeout: Duration::from_secs(5),
            channel_capacity: 10,
        }
    }
}

/// Whether the broker has acknowledged the current session.
///
/// Set on CONNACK and cleared on any connection error by the task polling
/// the event loop.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState(Arc<AtomicBool>);

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.0.store(connected, Ordering::Release);
    }
}

/// Publish handle onto the broker.
///
/// Publishing only enqueues; the returned `EventLoop` must be polled
/// (see `BridgeSupervisor`) for anything to reach the wire. While no
/// session is up, publishes are refused instead of queued.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
    connection: ConnectionState,
    publish_timeout: Duration,
}

impl std::fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBus")
            .field("connected", &self.connection.is_connected())
            .field("publish_timeout", &self.publish_timeout)
            .finish_non_exhaustive()
    }
}

impl MqttBus {
    pub fn new(settings: &MqttSettings) -> (Self, EventLoop) {
        let client_id = format!("{}-{}", settings.client_id_prefix, Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, &settings.host, settings.port);
        options.set_keep_alive(settings.keep_alive);

        let (client, eventloop) = AsyncClient::new(options, settings.channel_capacity.max(1));
        (
            Self {
                client,
                connection: ConnectionState::default(),
                publish_timeout: settings.publish_timeout,
            },
            eventloop,
        )
    }

    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection.clone()
    }

    /// At-most-once publish, bounded by the publish timeout
    pub async fn publish_bytes(&self, topic: &str, payload: Vec<u8>) -> MqttResult<()> {
        if !self.connection.is_connected() {
            warn!(topic, "MQTT broker not connected, refusing publish");
            return Err(MqttError::NotConnected {
                topic: topic.to_owned(),
            });
        }

        let publish = self.client.publish(topic, QoS::AtMostOnce, false, payload);
        match tokio::time::timeout(self.publish_timeout, publish).await {
            Ok(result) => {
                result?;
                debug!(topic, "Queued MQTT publish");
                Ok(())
            }
            Err(_) => {
                warn!(topic, timeout = ?self.publish_timeout, "MQTT publish timed out");
                Err(MqttError::PublishTimeout {
                    topic: topic.to_owned(),
                    timeout: self.publish_timeout,
                })
            }
        }
    }
}

#[async_trait]
impl MessageBusSink for MqttBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.publish_bytes(topic, payload).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "mqtt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxion_telemetry::{CommandService, TelemetryError, TelemetryKind, TopicMap};
    use serde_json::json;

    fn settings() -> MqttSettings {
        MqttSettings {
            host: "127.0.0.1".to_owned(),
            port: 1,
            publish_timeout: Duration::from_millis(100),
            channel_capacity: 1,
            ..MqttSettings::default()
        }
    }

    #[tokio::test]
    async fn test_publish_refused_without_connection() {
        let (bus, _eventloop) = MqttBus::new(&settings());
        assert!(!bus.connection().is_connected());

        let err = bus
            .publish_bytes("battery/power", b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, MqttError::NotConnected { ref topic } if topic == "battery/power"));
    }

    #[tokio::test]
    async fn test_publish_refused_again_after_connection_lost() {
        let (bus, _eventloop) = MqttBus::new(&settings());
        bus.connection().set_connected(true);
        bus.publish_bytes("battery/power", b"{}".to_vec()).await.unwrap();

        bus.connection().set_connected(false);
        let err = bus
            .publish_bytes("battery/power", b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, MqttError::NotConnected { .. }));
    }

    #[tokio::test]
    async fn test_setpoint_against_unreachable_broker_is_publish_failure() {
        let (bus, _eventloop) = MqttBus::new(&settings());
        let commands = CommandService::new(Arc::new(bus), TopicMap::default());

        let err = commands
            .publish_setpoint(TelemetryKind::Power, &json!({"power": 5}))
            .await
            .unwrap_err();

        assert!(matches!(err, TelemetryError::PublishFailed(ref m) if m.contains("Not connected")));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn test_publish_times_out_when_queue_is_full() {
        let (bus, _eventloop) = MqttBus::new(&settings());
        bus.connection().set_connected(true);
        bus.publish_bytes("battery/power", b"{}".to_vec()).await.unwrap();

        let err = bus
            .publish_bytes("battery/power", b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, MqttError::PublishTimeout { ref topic, .. } if topic == "battery/power"));
    }

    #[tokio::test]
    async fn test_trait_publish_maps_error() {
        let (bus, _eventloop) = MqttBus::new(&settings());
        bus.connection().set_connected(true);
        let sink: &dyn MessageBusSink = &bus;
        sink.publish("battery/SOC_limits", b"{}".to_vec()).await.unwrap();
        let err = sink
            .publish("battery/SOC_limits", b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
