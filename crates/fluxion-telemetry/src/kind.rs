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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TelemetryError;

/// Topic carrying SOC limit commands
pub const DEFAULT_SOC_LIMITS_TOPIC: &str = "battery/SOC_limits";

/// Kinds of battery telemetry the gateway understands.
///
/// Every kind determines the required payload field, the bus topic its
/// commands travel on, the field name in the time-series store and the
/// precision used when a timestamp has to be synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryKind {
    /// Battery state of charge in percent
    #[serde(alias = "SOC")]
    Soc,
    /// Net battery power setpoint
    Power,
    /// Charge power setpoint
    Charge,
    /// Discharge power setpoint
    Discharge,
}

/// Precision applied to synthesized timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Seconds and sub-seconds zeroed (periodic SOC/power samples)
    Minute,
    /// Sub-seconds zeroed (charge/discharge commands)
    Second,
}

impl TelemetryKind {
    /// List all telemetry kinds
    pub fn all() -> &'static [TelemetryKind] {
        &[Self::Soc, Self::Power, Self::Charge, Self::Discharge]
    }

    /// Field name used in payloads and in the time-series store
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Soc => "SOC",
            Self::Power => "power",
            Self::Charge => "charge",
            Self::Discharge => "discharge",
        }
    }

    /// Lowercase identifier used in URL paths and config files
    pub fn slug(self) -> &'static str {
        match self {
            Self::Soc => "soc",
            Self::Power => "power",
            Self::Charge => "charge",
            Self::Discharge => "discharge",
        }
    }

    pub fn precision(self) -> Precision {
        match self {
            Self::Soc | Self::Power => Precision::Minute,
            Self::Charge | Self::Discharge => Precision::Second,
        }
    }

    pub fn default_topic(self) -> &'static str {
        match self {
            Self::Soc => "battery/SOC",
            Self::Power => "battery/power",
            Self::Charge => "battery/charge",
            Self::Discharge => "battery/discharge",
        }
    }

    pub fn default_unit(self) -> &'static str {
        match self {
            Self::Soc => "%",
            Self::Power | Self::Charge | Self::Discharge => "kW",
        }
    }

    /// Path of the write endpoint accepting this kind
    pub fn write_path(self) -> String {
        format!("/write/{}", self.slug())
    }
}

impl fmt::Display for TelemetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for TelemetryKind {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| {
                kind.slug().eq_ignore_ascii_case(s) || kind.field_name().eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| {
                TelemetryError::InvalidPayload(format!(
                    "Unknown telemetry kind: '{s}'. Supported kinds: {}",
                    Self::all()
                        .iter()
                        .map(|k| k.slug())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

/// Bus topics per telemetry kind plus the SOC limits topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicMap {
    pub soc: String,
    pub power: String,
    pub charge: String,
    pub discharge: String,
    pub soc_limits: String,
}

impl Default for TopicMap {
    fn default() -> Self {
        Self {
            soc: TelemetryKind::Soc.default_topic().to_owned(),
            power: TelemetryKind::Power.default_topic().to_owned(),
            charge: TelemetryKind::Charge.default_topic().to_owned(),
            discharge: TelemetryKind::Discharge.default_topic().to_owned(),
            soc_limits: DEFAULT_SOC_LIMITS_TOPIC.to_owned(),
        }
    }
}

impl TopicMap {
    pub fn topic(&self, kind: TelemetryKind) -> &str {
        match kind {
            TelemetryKind::Soc => &self.soc,
            TelemetryKind::Power => &self.power,
            TelemetryKind::Charge => &self.charge,
            TelemetryKind::Discharge => &self.discharge,
        }
    }

    /// Reverse lookup; the first kind configured for the topic wins
    pub fn kind_for_topic(&self, topic: &str) -> Option<TelemetryKind> {
        TelemetryKind::all()
            .iter()
            .copied()
            .find(|kind| self.topic(*kind) == topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_slug_and_field_name() {
        assert_eq!("soc".parse::<TelemetryKind>(), Ok(TelemetryKind::Soc));
        assert_eq!("SOC".parse::<TelemetryKind>(), Ok(TelemetryKind::Soc));
        assert_eq!("Discharge".parse::<TelemetryKind>(), Ok(TelemetryKind::Discharge));
        assert!("voltage".parse::<TelemetryKind>().is_err());
    }

    #[test]
    fn test_precision_per_kind() {
        assert_eq!(TelemetryKind::Soc.precision(), Precision::Minute);
        assert_eq!(TelemetryKind::Power.precision(), Precision::Minute);
        assert_eq!(TelemetryKind::Charge.precision(), Precision::Second);
        assert_eq!(TelemetryKind::Discharge.precision(), Precision::Second);
    }

    #[test]
    fn test_topic_lookup_both_ways() {
        let topics = TopicMap::default();
        assert_eq!(topics.topic(TelemetryKind::Power), "battery/power");
        assert_eq!(topics.soc_limits, "battery/SOC_limits");
        assert_eq!(
            topics.kind_for_topic("battery/discharge"),
            Some(TelemetryKind::Discharge)
        );
        assert_eq!(topics.kind_for_topic("battery/SOC_limits"), None);
    }

    #[test]
    fn test_serde_names() {
        let kinds: Vec<TelemetryKind> = serde_json::from_str(r#"["power", "SOC", "charge"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![TelemetryKind::Power, TelemetryKind::Soc, TelemetryKind::Charge]
        );
        assert_eq!(TelemetryKind::Charge.write_path(), "/write/charge");
    }
}
