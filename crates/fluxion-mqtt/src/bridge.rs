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

//! Bus-to-HTTP bridge.
//!
//! `BridgeRouter` decides what happens to a single bus message.
//! `BridgeSupervisor` owns the MQTT event loop, keeps the subscriptions
//! alive across reconnects and hands every publish to the router on its own
//! task so a slow peer never stalls polling.

use fluxion_telemetry::{
    BusMessage, MessageBuffer, SocLimits, SocLimitsTracker, TelemetryError, TelemetryForwarder,
    TelemetryKind, TopicMap,
};
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS, SubscribeFilter, SubscribeReasonCode};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::publisher::{ConnectionState, MqttBus};

// ============= Status =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeStatus {
    Disconnected,
    Connecting,
    Subscribed,
}

impl BridgeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
        }
    }
}

impl fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============= Backoff =============

/// Exponential reconnect delay, doubling up to `max`
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(60))
    }
}

// ============= Router =============

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Forwarded(TelemetryKind),
    ForwardFailed(TelemetryKind),
    LimitsUpdated(SocLimits),
    Rejected(TelemetryError),
    /// Topic is neither bridged nor the limits topic
    Ignored,
}

pub struct BridgeRouter {
    topics: TopicMap,
    kinds: Vec<TelemetryKind>,
    forwarder: Arc<dyn TelemetryForwarder>,
    buffer: Arc<MessageBuffer>,
    limits: Arc<SocLimitsTracker>,
}

impl fmt::Debug for BridgeRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeRouter")
            .field("topics", &self.topics)
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

impl BridgeRouter {
    pub fn new(
        topics: TopicMap,
        kinds: Vec<TelemetryKind>,
        forwarder: Arc<dyn TelemetryForwarder>,
        buffer: Arc<MessageBuffer>,
        limits: Arc<SocLimitsTracker>,
    ) -> Self {
        Self {
            topics,
            kinds,
            forwarder,
            buffer,
            limits,
        }
    }

    /// Topics of the bridged kinds followed by the SOC limits topic
    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .kinds
            .iter()
            .map(|kind| self.topics.topic(*kind).to_owned())
            .collect();
        if !topics.contains(&self.topics.soc_limits) {
            topics.push(self.topics.soc_limits.clone());
        }
        topics
    }

    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        self.buffer.push(BusMessage::new(topic, payload));

        let message = match parse_object(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(topic, error = %e, "Dropping bus message");
                return DispatchOutcome::Rejected(e);
            }
        };

        if topic == self.topics.soc_limits {
            return match self.limits.apply_update(&message) {
                Ok(limits) => DispatchOutcome::LimitsUpdated(limits),
                Err(e) => {
                    warn!(topic, error = %e, "Rejected SOC limits update");
                    DispatchOutcome::Rejected(e)
                }
            };
        }

        let Some(kind) = self
            .topics
            .kind_for_topic(topic)
            .filter(|kind| self.kinds.contains(kind))
        else {
            debug!(topic, "No route for bus message");
            return DispatchOutcome::Ignored;
        };

        match self.forwarder.forward(&kind.write_path(), &message).await {
            Ok(()) => {
                debug!(topic, kind = %kind, "Bridged bus message");
                DispatchOutcome::Forwarded(kind)
            }
            Err(e) => {
                warn!(topic, kind = %kind, error = %format!("{e:#}"), "Failed to forward bus message");
                DispatchOutcome::ForwardFailed(kind)
            }
        }
    }
}

fn parse_object(payload: &[u8]) -> Result<Value, TelemetryError> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| TelemetryError::InvalidPayload(format!("not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(TelemetryError::InvalidPayload(
            "expected a JSON object".to_owned(),
        ));
    }
    Ok(value)
}

// ============= Supervisor =============

/// Drives the MQTT event loop: connect, subscribe, dispatch, back off, repeat.
///
/// Also serves as the only poller of the shared connection, so it must run
/// even when no topics are bridged; publishes from `MqttBus` go out through it
/// and are refused while the connection flag it maintains is down.
pub struct BridgeSupervisor {
    client: AsyncClient,
    eventloop: EventLoop,
    connection: ConnectionState,
    router: Option<Arc<BridgeRouter>>,
    backoff: Backoff,
    status: watch::Sender<BridgeStatus>,
    resubscribe_at: Option<Instant>,
}

impl fmt::Debug for BridgeSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSupervisor")
            .field("router", &self.router)
            .field("backoff", &self.backoff)
            .field("status", &*self.status.borrow())
            .field("connected", &self.connection.is_connected())
            .finish_non_exhaustive()
    }
}

impl BridgeSupervisor {
    pub fn new(
        bus: &MqttBus,
        eventloop: EventLoop,
        router: Option<Arc<BridgeRouter>>,
        backoff: Backoff,
    ) -> (Self, watch::Receiver<BridgeStatus>) {
        let (status, status_rx) = watch::channel(BridgeStatus::Connecting);
        (
            Self {
                client: bus.client(),
                eventloop,
                connection: bus.connection(),
                router,
                backoff,
                status,
                resubscribe_at: None,
            },
            status_rx,
        )
    }

    fn set_status(&self, next: BridgeStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            info!(status = %next, "MQTT bridge status changed");
        }
    }

    fn mark_subscribed(&mut self) {
        self.resubscribe_at = None;
        self.backoff.reset();
        self.set_status(BridgeStatus::Subscribed);
    }

    fn subscribe_all(&mut self) {
        let topics = self
            .router
            .as_ref()
            .map(|router| router.subscriptions())
            .unwrap_or_default();

        if topics.is_empty() {
            self.mark_subscribed();
            return;
        }

        let filters: Vec<SubscribeFilter> = topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtMostOnce))
            .collect();
        match self.client.try_subscribe_many(filters) {
            Ok(()) => info!(topics = ?topics, "Subscribing to bus topics"),
            Err(e) => {
                error!(error = %e, "Failed to queue subscription");
                self.schedule_resubscribe();
            }
        }
    }

    fn schedule_resubscribe(&mut self) {
        let delay = self.backoff.next_delay();
        warn!(retry_in = ?delay, "Retrying bus subscription");
        self.resubscribe_at = Some(Instant::now() + delay);
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::ConnAck(_) => {
                info!("Connected to MQTT broker");
                self.connection.set_connected(true);
                self.backoff.reset();
                self.subscribe_all();
            }
            Packet::SubAck(suback) => {
                if suback
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    error!(codes = ?suback.return_codes, "Broker refused a subscription");
                    self.set_status(BridgeStatus::Connecting);
                    self.schedule_resubscribe();
                } else {
                    self.mark_subscribed();
                }
            }
            Packet::Publish(publish) => {
                let Some(router) = self.router.clone() else {
                    return;
                };
                tokio::spawn(async move {
                    router.dispatch(&publish.topic, &publish.payload).await;
                });
            }
            _ => {}
        }
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped)
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.set_status(BridgeStatus::Connecting);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let resubscribe_at = self.resubscribe_at;
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                () = tokio::time::sleep_until(resubscribe_at.unwrap_or_else(Instant::now)),
                    if resubscribe_at.is_some() =>
                {
                    self.resubscribe_at = None;
                    self.subscribe_all();
                }
                event = self.eventloop.poll() => match event {
                    Ok(Event::Incoming(packet)) => self.handle_packet(packet),
                    Ok(Event::Outgoing(_)) => {}
                    Err(e) => {
                        self.connection.set_connected(false);
                        self.resubscribe_at = None;
                        self.set_status(BridgeStatus::Disconnected);
                        let delay = self.backoff.next_delay();
                        warn!(error = %e, retry_in = ?delay, "MQTT connection error");

                        tokio::select! {
                            changed = shutdown.changed() => {
                                if changed.is_err() || *shutdown.borrow() {
                                    break;
                                }
                            }
                            () = tokio::time::sleep(delay) => {}
                        }
                        self.set_status(BridgeStatus::Connecting);
                    }
                },
            }
        }

        self.connection.set_connected(false);
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "MQTT disconnect not sent");
        }
        self.set_status(BridgeStatus::Disconnected);
        info!("MQTT bridge stopped");
    }
}
