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

//! Process wiring: sinks, bridge, simulator and the HTTP listener

use anyhow::{Context, Result};
use fluxion_influx::InfluxClient;
use fluxion_mqtt::{BridgeRouter, BridgeSupervisor, HttpForwarder, MqttBus};
use fluxion_telemetry::{
    CommandService, LatestValues, MessageBuffer, SocLimitsTracker, TelemetryForwarder,
    TelemetryService,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::routes::{AppState, build_router};
use crate::simulator::SocSimulator;

/// HTTP client towards the peer gateway, only when something forwards to it
pub fn build_forwarder(config: &GatewayConfig) -> Result<Option<Arc<dyn TelemetryForwarder>>> {
    if !config.needs_peer() {
        return Ok(None);
    }
    let forwarder: Arc<dyn TelemetryForwarder> = Arc::new(
        HttpForwarder::new(
            config.bridge.peer_base_url.clone(),
            Duration::from_secs(config.bridge.forward_timeout_secs),
        )
        .context("Failed to create bridge forwarder")?,
    );
    Ok(Some(forwarder))
}

/// Run the gateway until `shutdown` flips to `true`
pub async fn run(config: GatewayConfig, shutdown: watch::Receiver<bool>) -> Result<()> {
    let influx = Arc::new(
        InfluxClient::new(config.influxdb.to_settings()).context("Failed to create InfluxDB client")?,
    );
    if !influx.ping().await {
        warn!(url = %config.influxdb.url, "InfluxDB is not reachable yet; writes fail until it is");
    }

    let telemetry = Arc::new(TelemetryService::new(
        influx,
        Arc::new(LatestValues::new()),
        config.influxdb.measurement.clone(),
        config.read_defaults(),
    ));

    let messages = Arc::new(MessageBuffer::new(config.server.message_buffer_capacity));
    let limits = Arc::new(SocLimitsTracker::default());
    let forwarder = build_forwarder(&config)?;

    let router = if config.bridge.enabled
        && let Some(forwarder) = &forwarder
    {
        Some(Arc::new(BridgeRouter::new(
            config.topics.clone(),
            config.bridge.kinds.clone(),
            forwarder.clone(),
            messages.clone(),
            limits.clone(),
        )))
    } else {
        info!("Bus-to-HTTP bridge disabled");
        None
    };

    // The supervisor shares the bus connection flag, so commands are
    // refused rather than queued while the broker is away
    let (bus, eventloop) = MqttBus::new(&config.mqtt.to_settings());
    let (supervisor, bridge_status) =
        BridgeSupervisor::new(&bus, eventloop, router, config.mqtt.backoff());
    let commands = Arc::new(CommandService::new(Arc::new(bus), config.topics.clone()));
    let mqtt_task = tokio::spawn(supervisor.run(shutdown.clone()));

    let simulator_task = forwarder
        .filter(|_| config.simulator.enabled)
        .map(|forwarder| tokio::spawn(SocSimulator::new(forwarder, limits).run(shutdown.clone())));

    let app = build_router(AppState {
        telemetry,
        commands,
        messages,
        bridge_status,
        primary_kind: config.server.primary_kind,
    });

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("🌐 Gateway listening on http://{addr}");

    let mut server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("HTTP server failed")?;

    if let Err(e) = mqtt_task.await {
        error!(error = %e, "MQTT task panicked");
    }
    if let Some(task) = simulator_task
        && let Err(e) = task.await
    {
        error!(error = %e, "SOC simulator task panicked");
    }

    info!("Gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_forwarder_without_bridge_or_simulator() {
        let mut config = GatewayConfig::default();
        config.bridge.enabled = false;
        config.simulator.enabled = false;
        config.bridge.peer_base_url = "not a url".to_owned();

        assert!(build_forwarder(&config).unwrap().is_none());
    }

    #[test]
    fn test_forwarder_for_simulator_alone() {
        let mut config = GatewayConfig::default();
        config.bridge.enabled = false;
        config.simulator.enabled = true;

        assert!(build_forwarder(&config).unwrap().is_some());

        config.bridge.peer_base_url = "ftp://peer".to_owned();
        assert!(build_forwarder(&config).is_err());
    }
}
