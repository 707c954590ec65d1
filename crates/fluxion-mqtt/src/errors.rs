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

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("Not connected to the MQTT broker, publish to '{topic}' dropped")]
    NotConnected { topic: String },

    #[error("Publish to '{topic}' timed out after {timeout:?}")]
    PublishTimeout { topic: String, timeout: Duration },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Forward to '{url}' rejected with status {status}: {body}")]
    ForwardRejected {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type MqttResult<T> = std::result::Result<T, MqttError>;
