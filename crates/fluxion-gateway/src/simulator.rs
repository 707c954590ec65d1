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

//! Simulated SOC readings, one per full UTC minute, within the current SOC limits

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use fluxion_telemetry::timestamp::truncate;
use fluxion_telemetry::{
    CanonicalTimestamp, Precision, SocLimits, SocLimitsTracker, TelemetryForwarder, TelemetryKind,
};
use rand::Rng;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Time left until the next full minute
pub fn next_minute_delay(now: DateTime<Utc>) -> Duration {
    let next = truncate(now, Precision::Minute) + TimeDelta::minutes(1);
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Uniform integer SOC within `[lower, upper]`
///
/// Returns `None` when the band holds no integer, e.g. `20.5..=20.7`.
#[expect(clippy::cast_possible_truncation, reason = "limits are validated to 0..=100")]
pub fn sample_soc<R: Rng>(limits: SocLimits, rng: &mut R) -> Option<i64> {
    let lower = limits.lower.ceil() as i64;
    let upper = limits.upper.floor() as i64;
    if lower > upper {
        return None;
    }
    Some(rng.gen_range(lower..=upper))
}

pub struct SocSimulator {
    forwarder: Arc<dyn TelemetryForwarder>,
    limits: Arc<SocLimitsTracker>,
}

impl fmt::Debug for SocSimulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocSimulator")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl SocSimulator {
    pub fn new(forwarder: Arc<dyn TelemetryForwarder>, limits: Arc<SocLimitsTracker>) -> Self {
        Self { forwarder, limits }
    }

    /// Send one reading stamped with the minute of `now`
    ///
    /// Yields `None` without forwarding anything when the current limits
    /// leave no whole percentage to pick.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Option<Value>> {
        let limits = self.limits.current();
        let Some(soc) = sample_soc(limits, &mut rand::thread_rng()) else {
            warn!(
                upper = limits.upper,
                lower = limits.lower,
                "SOC limits contain no whole percentage, skipping simulated reading"
            );
            return Ok(None);
        };
        let timestamp = CanonicalTimestamp::new(truncate(now, Precision::Minute));
        let payload = json!({
            "SOC": soc,
            "timestamp": timestamp.to_string(),
        });

        self.forwarder
            .forward(&TelemetryKind::Soc.write_path(), &payload)
            .await?;
        debug!(soc, timestamp = %timestamp, "Simulated SOC written");
        Ok(Some(payload))
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("SOC simulator started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let delay = next_minute_delay(Utc::now());
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                () = tokio::time::sleep(delay) => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        warn!(error = %format!("{e:#}"), "Failed to write simulated SOC");
                    }
                }
            }
        }
        info!("SOC simulator stopped");
    }
}
