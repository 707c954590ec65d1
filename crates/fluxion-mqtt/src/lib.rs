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

//! MQTT side of the battery gateway: command publishing and the bus-to-HTTP bridge

pub mod bridge;
pub mod errors;
pub mod forwarder;
pub mod publisher;

pub use bridge::{Backoff, BridgeRouter, BridgeStatus, BridgeSupervisor, DispatchOutcome};
pub use errors::{MqttError, MqttResult};
pub use forwarder::HttpForwarder;
pub use publisher::{ConnectionState, MqttBus, MqttSettings};
