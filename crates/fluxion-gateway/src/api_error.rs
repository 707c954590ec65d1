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

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fluxion_telemetry::TelemetryError;
use serde_json::json;
use tracing::debug;

/// `TelemetryError` rendered as `{"error": "..."}` with 400 or 500
#[derive(Debug)]
pub struct ApiError(pub TelemetryError);

impl From<TelemetryError> for ApiError {
    fn from(error: TelemetryError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        debug!(status = %status, error = %self.0, "Request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(TelemetryError::MissingField("SOC".to_owned())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(TelemetryError::InvalidRange("x y".to_owned())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(TelemetryError::SinkUnavailable("down".to_owned())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(TelemetryError::PublishFailed("down".to_owned())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
