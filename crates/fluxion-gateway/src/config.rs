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

use anyhow::{Context, Result, bail};
use fluxion_telemetry::{DEFAULT_MESSAGE_BUFFER_CAPACITY, ReadDefaults, TelemetryKind, TopicMap};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub influxdb: InfluxDbSettings,
    #[serde(default)]
    pub mqtt: MqttBrokerSettings,
    #[serde(default)]
    pub topics: TopicMap,
    #[serde(default)]
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub simulator: SimulatorSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Kind served by the bare `/write` and `/livedata` routes
    #[serde(default = "default_primary_kind")]
    pub primary_kind: TelemetryKind,
    #[serde(default = "default_read_begin")]
    pub read_begin: String,
    #[serde(default = "default_read_end")]
    pub read_end: String,
    #[serde(default = "default_message_buffer_capacity")]
    pub message_buffer_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfluxDbSettings {
    #[serde(default = "default_influx_url")]
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_influx_org")]
    pub org: String,
    #[serde(default = "default_influx_bucket")]
    pub bucket: String,
    #[serde(default = "default_measurement")]
    pub measurement: String,
    #[serde(default = "default_influx_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttBrokerSettings {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bridged_kinds")]
    pub kinds: Vec<TelemetryKind>,
    #[serde(default = "default_peer_base_url")]
    pub peer_base_url: String,
    #[serde(default = "default_forward_timeout_secs")]
    pub forward_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulatorSettings {
    #[serde(default)]
    pub enabled: bool,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    5003
}

fn default_primary_kind() -> TelemetryKind {
    TelemetryKind::Power
}

fn default_read_begin() -> String {
    ReadDefaults::default().begin
}

fn default_read_end() -> String {
    ReadDefaults::default().end
}

fn default_message_buffer_capacity() -> usize {
    DEFAULT_MESSAGE_BUFFER_CAPACITY
}

fn default_influx_url() -> String {
    "http://influxdb:8086".to_owned()
}

fn default_influx_org() -> String {
    "ENI".to_owned()
}

fn default_influx_bucket() -> String {
    "battery01".to_owned()
}

fn default_measurement() -> String {
    fluxion_telemetry::service::DEFAULT_MEASUREMENT.to_owned()
}

fn default_influx_timeout_secs() -> u64 {
    10
}

fn default_mqtt_host() -> String {
    "mqtt-broker".to_owned()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id_prefix() -> String {
    "fluxion-gateway".to_owned()
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_publish_timeout_secs() -> u64 {
    5
}

fn default_reconnect_initial_ms() -> u64 {
    500
}

fn default_reconnect_max_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_bridged_kinds() -> Vec<TelemetryKind> {
    vec![
        TelemetryKind::Power,
        TelemetryKind::Charge,
        TelemetryKind::Discharge,
    ]
}

fn default_peer_base_url() -> String {
    "http://127.0.0.1:5003".to_owned()
}

fn default_forward_timeout_secs() -> u64 {
    10
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            primary_kind: default_primary_kind(),
            read_begin: default_read_begin(),
            read_end: default_read_end(),
            message_buffer_capacity: default_message_buffer_capacity(),
        }
    }
}

impl Default for InfluxDbSettings {
    fn default() -> Self {
        Self {
            url: default_influx_url(),
            token: String::new(),
            org: default_influx_org(),
            bucket: default_influx_bucket(),
            measurement: default_measurement(),
            timeout_secs: default_influx_timeout_secs(),
        }
    }
}

impl Default for MqttBrokerSettings {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id_prefix: default_client_id_prefix(),
            keep_alive_secs: default_keep_alive_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_secs: default_reconnect_max_secs(),
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            kinds: default_bridged_kinds(),
            peer_base_url: default_peer_base_url(),
            forward_timeout_secs: default_forward_timeout_secs(),
        }
    }
}

impl MqttBrokerSettings {
    pub fn to_settings(&self) -> fluxion_mqtt::MqttSettings {
        fluxion_mqtt::MqttSettings {
            host: self.host.clone(),
            port: self.port,
            client_id_prefix: self.client_id_prefix.clone(),
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            publish_timeout: Duration::from_secs(self.publish_timeout_secs),
            ..fluxion_mqtt::MqttSettings::default()
        }
    }

    pub fn backoff(&self) -> fluxion_mqtt::Backoff {
        fluxion_mqtt::Backoff::new(
            Duration::from_millis(self.reconnect_initial_ms),
            Duration::from_secs(self.reconnect_max_secs),
        )
    }
}

impl InfluxDbSettings {
    pub fn to_settings(&self) -> fluxion_influx::InfluxSettings {
        fluxion_influx::InfluxSettings {
            url: self.url.clone(),
            token: self.token.clone(),
            org: self.org.clone(),
            bucket: self.bucket.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl GatewayConfig {
    /// Load from `path` (or defaults), apply process environment, validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Environment wins over the file; `lookup` is `std::env::var` outside tests
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MQTT_BROKER_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = lookup("MQTT_BROKER_PORT") {
            self.mqtt.port = port
                .parse()
                .with_context(|| format!("MQTT_BROKER_PORT is not a port: {port}"))?;
        }
        if let Some(topic) = lookup("MQTT_TOPIC") {
            self.topics.power = topic;
        }
        if let Some(topic) = lookup("MQTT_TOPIC_DISCHARGE") {
            self.topics.discharge = topic;
        }
        if let Some(url) = lookup("INFLUXDB_URL") {
            self.influxdb.url = url;
        }
        if let Some(token) = lookup("INFLUXDB_TOKEN") {
            self.influxdb.token = token;
        }
        if let Some(org) = lookup("INFLUXDB_ORG") {
            self.influxdb.org = org;
        }
        if let Some(bucket) = lookup("INFLUXDB_BUCKET") {
            self.influxdb.bucket = bucket;
        }
        if let Some(url) = lookup("BRIDGE_PEER_URL") {
            self.bridge.peer_base_url = url;
        }
        if let Some(port) = lookup("GATEWAY_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("GATEWAY_PORT is not a port: {port}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.influxdb.url.is_empty() {
            bail!("influxdb.url must be set");
        }
        if self.influxdb.bucket.is_empty() || self.influxdb.org.is_empty() {
            bail!("influxdb.org and influxdb.bucket must be set");
        }
        if self.influxdb.measurement.is_empty() {
            bail!("influxdb.measurement must not be empty");
        }
        if self.mqtt.host.is_empty() {
            bail!("mqtt.host must be set");
        }
        if self.server.message_buffer_capacity == 0 {
            bail!("server.message_buffer_capacity must be at least 1");
        }
        fluxion_telemetry::service::validate_range_expr(&self.server.read_begin)
            .context("server.read_begin")?;
        fluxion_telemetry::service::validate_range_expr(&self.server.read_end)
            .context("server.read_end")?;

        let topics = [
            &self.topics.soc,
            &self.topics.power,
            &self.topics.charge,
            &self.topics.discharge,
            &self.topics.soc_limits,
        ];
        if topics.iter().any(|t| t.is_empty() || t.contains(['+', '#'])) {
            bail!("topics must be non-empty and must not contain wildcards");
        }
        for (i, topic) in topics.iter().enumerate() {
            if topics[i + 1..].contains(topic) {
                bail!("topic '{topic}' is assigned more than once");
            }
        }

        if self.bridge.enabled && self.bridge.kinds.is_empty() {
            bail!("bridge.kinds must list at least one kind when the bridge is enabled");
        }
        if self.needs_peer()
            && !(self.bridge.peer_base_url.starts_with("http://")
                || self.bridge.peer_base_url.starts_with("https://"))
        {
            bail!("bridge.peer_base_url must be an http(s) URL");
        }
        Ok(())
    }

    /// Whether the bridge or the simulator posts to the peer gateway
    pub fn needs_peer(&self) -> bool {
        self.bridge.enabled || self.simulator.enabled
    }

    pub fn read_defaults(&self) -> ReadDefaults {
        ReadDefaults {
            begin: self.server.read_begin.clone(),
            end: self.server.read_end.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server.port, 5003);
        assert_eq!(config.influxdb.bucket, "battery01");
        assert_eq!(config.topics.soc_limits, "battery/SOC_limits");
        assert!(config.bridge.enabled);
        assert!(!config.simulator.enabled);
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080
primary_kind = "SOC"

[topics]
charge = "site1/charge"

[bridge]
kinds = ["charge"]
"#
        )
        .unwrap();

        let config = GatewayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.primary_kind, TelemetryKind::Soc);
        assert_eq!(config.server.read_begin, "-1h");
        assert_eq!(config.topics.charge, "site1/charge");
        assert_eq!(config.topics.power, "battery/power");
        assert_eq!(config.bridge.kinds, vec![TelemetryKind::Charge]);
        assert_eq!(config.influxdb.org, "ENI");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MQTT_BROKER_HOST", "localhost"),
            ("MQTT_BROKER_PORT", "1884"),
            ("MQTT_TOPIC", "site/power"),
            ("INFLUXDB_TOKEN", "secret"),
            ("GATEWAY_PORT", "5004"),
        ]
        .into_iter()
        .collect();

        let mut config = GatewayConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| (*v).to_owned()))
            .unwrap();

        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.topics.power, "site/power");
        assert_eq!(config.influxdb.token, "secret");
        assert_eq!(config.server.port, 5004);
    }

    #[test]
    fn test_bad_env_port() {
        let mut config = GatewayConfig::default();
        let result = config.apply_env_overrides(|key| {
            (key == "MQTT_BROKER_PORT").then(|| "eighteen".to_owned())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_topics() {
        let mut config = GatewayConfig::default();
        config.topics.charge = config.topics.power.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_peer_url_checked_only_when_used() {
        let mut config = GatewayConfig::default();
        config.bridge.peer_base_url = "peer:5003".to_owned();
        assert!(config.validate().is_err());

        config.bridge.enabled = false;
        assert!(!config.needs_peer());
        config.validate().unwrap();

        config.simulator.enabled = true;
        assert!(config.needs_peer());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_read_default() {
        let mut config = GatewayConfig::default();
        config.server.read_begin = "-1h; drop".to_owned();
        assert!(config.validate().is_err());
    }
}
