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
use async_trait::async_trait;
use fluxion_telemetry::{FieldRecord, TelemetryPoint, TimeRange, TimeSeriesSink};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::errors::{InfluxError, InfluxResult};
use crate::line_protocol::encode_point;
use crate::query::{build_range_query, parse_records, query_body};

/// Connection settings for an InfluxDB v2 instance
#[derive(Debug, Clone)]
pub struct InfluxSettings {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub timeout: Duration,
}

/// InfluxDB v2 HTTP API client.
///
/// Every call is a single attempt; failures surface to the caller.
#[derive(Clone)]
pub struct InfluxClient {
    base_url: String,
    token: String,
    org: String,
    bucket: String,
    client: Client,
}

impl std::fmt::Debug for InfluxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxClient")
            .field("base_url", &self.base_url)
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl InfluxClient {
    pub fn new(settings: InfluxSettings) -> InfluxResult<Self> {
        if settings.url.is_empty() {
            return Err(InfluxError::Config("InfluxDB URL is empty".to_owned()));
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| InfluxError::Config(format!("Failed to build HTTP client: {e}")))?;

        info!(url = %settings.url, org = %settings.org, bucket = %settings.bucket, "Initializing InfluxDB client");
        Ok(Self {
            base_url: settings.url.trim_end_matches('/').to_owned(),
            token: settings.token,
            org: settings.org,
            bucket: settings.bucket,
            client,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    /// Write line-protocol text with nanosecond precision
    pub async fn write_lines(&self, lines: &str) -> InfluxResult<()> {
        let url = format!("{}/api/v2/write", self.base_url);
        debug!(lines, "[INFLUX WRITE]");

        let response = self
            .client
            .post(&url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Authorization", self.auth_header())
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(lines.to_owned())
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            _ => Err(Self::api_error("write", response).await),
        }
    }

    /// Run a Flux query and return the raw CSV body
    pub async fn query_csv(&self, flux: &str) -> InfluxResult<String> {
        let url = format!("{}/api/v2/query", self.base_url);
        debug!(flux, "[INFLUX QUERY]");

        let response = self
            .client
            .post(&url)
            .query(&[("org", self.org.as_str())])
            .header("Authorization", self.auth_header())
            .header("Accept", "application/csv")
            .json(&query_body(flux))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.text().await?),
            _ => Err(Self::api_error("query", response).await),
        }
    }

    /// Health check against `/health`; never errors
    pub async fn ping(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("InfluxDB health check passed");
                true
            }
            Ok(response) => {
                warn!(status = %response.status(), "InfluxDB health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "InfluxDB health check failed");
                false
            }
        }
    }

    async fn api_error(operation: &str, response: Response) -> InfluxError {
        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            error!(operation, "InfluxDB authentication failed");
            return InfluxError::AuthenticationFailed;
        }

        let message = response.text().await.unwrap_or_default();
        error!(operation, status = %status, message = %message, "InfluxDB request failed");
        InfluxError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl TimeSeriesSink for InfluxClient {
    async fn write_point(&self, point: &TelemetryPoint) -> Result<()> {
        let line = encode_point(point)?;
        self.write_lines(&line).await?;
        Ok(())
    }

    async fn query_range(&self, range: &TimeRange) -> Result<Vec<FieldRecord>> {
        let flux = build_range_query(&self.bucket, range);
        let body = self.query_csv(&flux).await?;
        let records = parse_records(&body)?;
        debug!(count = records.len(), "Parsed InfluxDB records");
        Ok(records)
    }

    fn name(&self) -> &str {
        "influxdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fluxion_telemetry::CanonicalTimestamp;
    use mockito::{Matcher, Server};
    use serde_json::{Number, json};

    fn settings(url: String) -> InfluxSettings {
        InfluxSettings {
            url,
            token: "test_token".to_owned(),
            org: "ENI".to_owned(),
            bucket: "battery01".to_owned(),
            timeout: Duration::from_secs(5),
        }
    }

    fn point() -> TelemetryPoint {
        TelemetryPoint {
            measurement: "battery_data".to_owned(),
            field: "power".to_owned(),
            value: Number::from(42),
            timestamp: CanonicalTimestamp::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_write_point_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("org".into(), "ENI".into()),
                Matcher::UrlEncoded("bucket".into(), "battery01".into()),
                Matcher::UrlEncoded("precision".into(), "ns".into()),
            ]))
            .match_header("authorization", "Token test_token")
            .match_body("battery_data power=42.0 1735689600000000000")
            .with_status(204)
            .create_async()
            .await;

        let client = InfluxClient::new(settings(server.url())).unwrap();
        client.write_point(&point()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_write_point_unauthorized() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::Any)
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let client = InfluxClient::new(settings(server.url())).unwrap();
        let err = client.write_lines("battery_data power=1.0 1").await.unwrap_err();

        assert!(matches!(err, InfluxError::AuthenticationFailed));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_write_server_error_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("engine overloaded")
            .expect(1)
            .create_async()
            .await;

        let client = InfluxClient::new(settings(server.url())).unwrap();
        let err = client.write_point(&point()).await.unwrap_err();

        assert!(err.to_string().contains("503"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_range_parses_csv() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/query")
            .match_query(Matcher::UrlEncoded("org".into(), "ENI".into()))
            .match_header("authorization", "Token test_token")
            .match_header("accept", "application/csv")
            .match_body(Matcher::PartialJson(json!({
                "query": "from(bucket: \"battery01\") |> range(start: -1h, stop: now()) |> filter(fn: (r) => r._measurement == \"battery_data\")",
                "type": "flux",
            })))
            .with_status(200)
            .with_header("content-type", "text/csv")
            .with_body(
                ",result,table,_time,_value,_field,_measurement\r\n\
                 ,_result,0,2025-01-01T00:10:00Z,42,power,battery_data\r\n",
            )
            .create_async()
            .await;

        let client = InfluxClient::new(settings(server.url())).unwrap();
        let range = TimeRange {
            measurement: "battery_data".to_owned(),
            start: "-1h".to_owned(),
            stop: "now()".to_owned(),
        };
        let records = client.query_range(&range).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field, "power");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ping() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status":"pass"}"#)
            .create_async()
            .await;

        let client = InfluxClient::new(settings(server.url())).unwrap();
        assert!(client.ping().await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ping_unreachable() {
        let client = InfluxClient::new(settings("http://127.0.0.1:1".to_owned())).unwrap();
        assert!(!client.ping().await);
    }

    #[test]
    fn test_empty_url_rejected() {
        let err = InfluxClient::new(settings(String::new())).unwrap_err();
        assert!(matches!(err, InfluxError::Config(_)));
    }
}
