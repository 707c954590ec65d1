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

//! Error taxonomy for the telemetry pipeline

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Missing '{0}' field")]
    MissingField(String),

    #[error("Invalid '{field}' field: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid timestamp '{input}': {reason}")]
    InvalidTimestamp { input: String, reason: String },

    #[error("Invalid time range expression '{0}'")]
    InvalidRange(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Time-series sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("Failed to publish command: {0}")]
    PublishFailed(String),
}

impl TelemetryError {
    /// Whether the caller caused this error (bad request) rather than a downstream system
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::SinkUnavailable(_) | Self::PublishFailed(_))
    }

    pub(crate) fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;
