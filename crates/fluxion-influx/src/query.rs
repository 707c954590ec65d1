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

//! Flux range queries and parsing of the CSV they return

use chrono::{DateTime, Utc};
use fluxion_telemetry::{FieldRecord, TimeRange};
use serde_json::{Value, json};
use tracing::trace;

use crate::errors::{InfluxError, InfluxResult};

pub fn build_range_query(bucket: &str, range: &TimeRange) -> String {
    format!(
        "from(bucket: \"{bucket}\") |> range(start: {start}, stop: {stop}) |> filter(fn: (r) => r._measurement == \"{measurement}\")",
        start = range.start,
        stop = range.stop,
        measurement = range.measurement.replace('"', "\\\""),
    )
}

/// Request body for `/api/v2/query`; plain CSV with a header row, no annotations
pub fn query_body(flux: &str) -> Value {
    json!({
        "query": flux,
        "type": "flux",
        "dialect": {
            "header": true,
            "annotations": [],
            "delimiter": ",",
        },
    })
}

enum Header {
    Data {
        time: usize,
        value: usize,
        field: usize,
    },
    Error {
        message: usize,
    },
}

impl Header {
    fn detect(row: &csv::StringRecord) -> InfluxResult<Option<Self>> {
        let position = |name: &str| row.iter().position(|c| c == name);

        if let (Some(message), Some(_)) = (position("error"), position("reference")) {
            return Ok(Some(Self::Error { message }));
        }
        if ["_time", "_value", "_field"].iter().all(|c| position(c).is_none()) {
            return Ok(None);
        }

        match (position("_time"), position("_value"), position("_field")) {
            (Some(time), Some(value), Some(field)) => Ok(Some(Self::Data { time, value, field })),
            _ => Err(InfluxError::MalformedResponse(format!(
                "header row lacks _time/_value/_field: {}",
                row.iter().collect::<Vec<_>>().join(",")
            ))),
        }
    }
}

/// Parse a (possibly multi-table) CSV query response into field records.
///
/// Each table starts with its own header row. Rows with a non-numeric
/// value are skipped.
pub fn parse_records(body: &str) -> InfluxResult<Vec<FieldRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let mut header: Option<Header> = None;
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row?;
        if row.iter().all(str::is_empty) {
            header = None;
            continue;
        }
        if let Some(detected) = Header::detect(&row)? {
            header = Some(detected);
            continue;
        }

        match &header {
            None => {
                return Err(InfluxError::MalformedResponse(
                    "data row before header row".to_owned(),
                ));
            }
            Some(Header::Error { message }) => {
                let message = row.get(*message).unwrap_or_default();
                return Err(InfluxError::QueryFailed(message.to_owned()));
            }
            Some(Header::Data { time, value, field }) => {
                let (Some(raw_time), Some(raw_value), Some(field)) =
                    (row.get(*time), row.get(*value), row.get(*field))
                else {
                    return Err(InfluxError::MalformedResponse(format!(
                        "short data row: {}",
                        row.iter().collect::<Vec<_>>().join(",")
                    )));
                };

                let Ok(value) = raw_value.parse::<f64>() else {
                    trace!(field, value = raw_value, "Skipping non-numeric value");
                    continue;
                };
                let time = DateTime::parse_from_rfc3339(raw_time)
                    .map_err(|e| {
                        InfluxError::MalformedResponse(format!("bad _time '{raw_time}': {e}"))
                    })?
                    .with_timezone(&Utc);

                records.push(FieldRecord {
                    time,
                    field: field.to_owned(),
                    value,
                });
            }
        }
    }

    Ok(records)
}
