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

//! HTTP forwarder used by the bridge to reach the telemetry write endpoints

use anyhow::Result;
use async_trait::async_trait;
use fluxion_telemetry::TelemetryForwarder;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::errors::{MqttError, MqttResult};

#[derive(Debug, Clone)]
pub struct HttpForwarder {
    base_url: String,
    client: Client,
}

impl HttpForwarder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> MqttResult<Self> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(MqttError::Config(format!(
                "peer URL must start with http:// or https://, got '{base_url}'"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MqttError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    pub async fn post(&self, path: &str, payload: &Value) -> MqttResult<()> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MqttError::ForwardRejected {
                url,
                status: status.as_u16(),
                body,
            });
        }

        debug!(url = %url, status = %status, "Forwarded bus message");
        Ok(())
    }
}

#[async_trait]
impl TelemetryForwarder for HttpForwarder {
    async fn forward(&self, path: &str, payload: &Value) -> Result<()> {
        self.post(path, payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_forward_posts_json() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/write/charge")
            .match_body(Matcher::Json(json!({"charge": 5})))
            .with_status(200)
            .create_async()
            .await;

        let forwarder = HttpForwarder::new(format!("{}/", server.url()), Duration::from_secs(2)).unwrap();
        forwarder
            .forward("/write/charge", &json!({"charge": 5}))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_rejected_status() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/write/power")
            .with_status(400)
            .with_body(r#"{"error":"Missing 'power' field"}"#)
            .expect(1)
            .create_async()
            .await;

        let forwarder = HttpForwarder::new(server.url(), Duration::from_secs(2)).unwrap();
        let err = forwarder.post("/write/power", &json!({})).await.unwrap_err();

        assert!(matches!(err, MqttError::ForwardRejected { status: 400, .. }));
        mock.assert_async().await;
    }

    #[test]
    fn test_rejects_non_http_peer() {
        let err = HttpForwarder::new("127.0.0.1:5003", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, MqttError::Config(_)));
    }
}
