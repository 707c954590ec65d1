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

//! FluxION battery gateway: HTTP API over the telemetry pipeline, wired to
//! InfluxDB and MQTT.

pub mod api_error;
pub mod config;
pub mod routes;
pub mod server;
pub mod simulator;

pub use api_error::ApiError;
pub use config::GatewayConfig;
pub use routes::{AppState, build_router};
pub use simulator::SocSimulator;
