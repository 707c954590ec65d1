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

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::{TelemetryError, TelemetryResult};

pub const UPPER_LIMIT_FIELD: &str = "upper_limit";
pub const LOWER_LIMIT_FIELD: &str = "lower_limit";

/// SOC band the battery is allowed to operate in (percent)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SocLimits {
    pub upper: f64,
    pub lower: f64,
}

impl Default for SocLimits {
    fn default() -> Self {
        Self {
            upper: 100.0,
            lower: 20.0,
        }
    }
}

impl SocLimits {
    pub fn validate(&self) -> TelemetryResult<()> {
        if !(0.0..=100.0).contains(&self.upper) {
            return Err(TelemetryError::invalid_field(
                UPPER_LIMIT_FIELD,
                "must be between 0 and 100",
            ));
        }
        if !(0.0..=100.0).contains(&self.lower) {
            return Err(TelemetryError::invalid_field(
                LOWER_LIMIT_FIELD,
                "must be between 0 and 100",
            ));
        }
        if self.lower > self.upper {
            return Err(TelemetryError::invalid_field(
                LOWER_LIMIT_FIELD,
                "must not exceed upper_limit",
            ));
        }
        Ok(())
    }
}

/// Latest SOC limits seen on the bus
#[derive(Debug, Default)]
pub struct SocLimitsTracker {
    current: RwLock<SocLimits>,
}

impl SocLimitsTracker {
    pub fn new(initial: SocLimits) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    pub fn current(&self) -> SocLimits {
        *self.current.read()
    }

    /// Apply a `{"upper_limit": .., "lower_limit": ..}` message.
    /// Either key may be missing; an update leaving the band inconsistent is rejected.
    pub fn apply_update(&self, message: &Value) -> TelemetryResult<SocLimits> {
        let object = message.as_object().ok_or_else(|| {
            TelemetryError::InvalidPayload("SOC limits message must be a JSON object".to_owned())
        })?;

        let mut guard = self.current.write();
        let mut next = *guard;
        if let Some(upper) = object.get(UPPER_LIMIT_FIELD) {
            next.upper = as_limit(UPPER_LIMIT_FIELD, upper)?;
        }
        if let Some(lower) = object.get(LOWER_LIMIT_FIELD) {
            next.lower = as_limit(LOWER_LIMIT_FIELD, lower)?;
        }
        next.validate()?;

        *guard = next;
        info!(upper = next.upper, lower = next.lower, "Updated SOC limits");
        Ok(next)
    }
}

fn as_limit(field: &str, value: &Value) -> TelemetryResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| TelemetryError::invalid_field(field, "expected a number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let tracker = SocLimitsTracker::default();
        assert_eq!(tracker.current(), SocLimits { upper: 100.0, lower: 20.0 });
    }

    #[test]
    fn test_partial_update_keeps_other_limit() {
        let tracker = SocLimitsTracker::default();
        let limits = tracker.apply_update(&json!({"lower_limit": 35})).unwrap();
        assert_eq!(limits, SocLimits { upper: 100.0, lower: 35.0 });

        let limits = tracker.apply_update(&json!({"upper_limit": 80.5})).unwrap();
        assert_eq!(limits, SocLimits { upper: 80.5, lower: 35.0 });
    }

    #[test]
    fn test_inconsistent_update_is_rejected() {
        let tracker = SocLimitsTracker::default();
        assert!(tracker.apply_update(&json!({"upper_limit": 10})).is_err());
        assert!(tracker.apply_update(&json!({"lower_limit": "high"})).is_err());
        assert!(tracker.apply_update(&json!([1, 2])).is_err());
        assert_eq!(tracker.current(), SocLimits::default());
    }
}
