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

//! Battery telemetry pipeline shared by the FluxION gateway crates.
//!
//! Readings arrive as loose JSON objects, get a canonical UTC timestamp,
//! land in a time-series sink and update an in-process latest-value cache.
//! Setpoint commands travel the other way, onto the message bus.

pub mod cache;
pub mod commands;
pub mod error;
pub mod kind;
pub mod limits;
pub mod messages;
mod payload;
pub mod service;
pub mod timestamp;
pub mod traits;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{LatestValue, LatestValues};
pub use commands::{CommandService, PublishedCommand};
pub use error::{TelemetryError, TelemetryResult};
pub use kind::{Precision, TelemetryKind, TopicMap};
pub use limits::{SocLimits, SocLimitsTracker};
pub use messages::{BusMessage, DEFAULT_MESSAGE_BUFFER_CAPACITY, MessageBuffer};
pub use service::{ReadDefaults, ReadingRow, TelemetryService};
pub use timestamp::CanonicalTimestamp;
pub use traits::{
    FieldRecord, MessageBusSink, TelemetryForwarder, TelemetryPoint, TimeRange, TimeSeriesSink,
};
