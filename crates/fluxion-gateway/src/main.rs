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
use clap::Parser;
use fluxion_gateway::{GatewayConfig, server};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "fluxion-gateway")]
#[command(about = "Battery telemetry gateway: HTTP API, InfluxDB sink and MQTT bridge", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "FLUXION_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Do not bridge bus messages to the HTTP write endpoints
    #[arg(long)]
    no_bridge: bool,

    /// Write a simulated SOC reading at every full minute
    #[arg(long)]
    simulate_soc: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Respects RUST_LOG
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let mut config = GatewayConfig::load(cli.config.as_deref())?;
    if cli.no_bridge {
        config.bridge.enabled = false;
    }
    if cli.simulate_soc {
        config.simulator.enabled = true;
    }
    config.validate()?;

    info!("🚀 Starting FluxION gateway");
    info!("   InfluxDB: {} (org {}, bucket {})", config.influxdb.url, config.influxdb.org, config.influxdb.bucket);
    info!("   MQTT broker: {}:{}", config.mqtt.host, config.mqtt.port);
    info!(
        "   Bridge: {} -> {}",
        if config.bridge.enabled { "enabled" } else { "disabled" },
        config.bridge.peer_base_url
    );
    info!("   SOC simulator: {}", config.simulator.enabled);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    server::run(config, shutdown_rx).await
}
