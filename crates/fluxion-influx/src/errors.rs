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

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfluxError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("InfluxDB API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Flux query failed: {0}")]
    QueryFailed(String),

    #[error("Failed to read CSV response: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed query response: {0}")]
    MalformedResponse(String),

    #[error("Point cannot be encoded: {0}")]
    InvalidPoint(String),
}

pub type InfluxResult<T> = std::result::Result<T, InfluxError>;
