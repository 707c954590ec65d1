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

use fluxion_mqtt::{BridgeRouter, DispatchOutcome, HttpForwarder};
use fluxion_telemetry::{MessageBuffer, SocLimitsTracker, TelemetryKind, TopicMap};
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn router(base_url: String, buffer: &Arc<MessageBuffer>) -> BridgeRouter {
    BridgeRouter::new(
        TopicMap::default(),
        vec![TelemetryKind::Power, TelemetryKind::Charge, TelemetryKind::Discharge],
        Arc::new(HttpForwarder::new(base_url, Duration::from_secs(2)).unwrap()),
        buffer.clone(),
        Arc::new(SocLimitsTracker::default()),
    )
}

#[tokio::test]
async fn bus_message_reaches_peer_write_endpoint() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/write/power")
        .match_body(Matcher::Json(json!({"power": 42})))
        .with_status(200)
        .with_body(r#"{"message": "Data written successfully"}"#)
        .expect(1)
        .create_async()
        .await;

    let buffer = Arc::new(MessageBuffer::new(10));
    let outcome = router(server.url(), &buffer)
        .dispatch("battery/power", br#"{"power": 42}"#)
        .await;

    assert_eq!(outcome, DispatchOutcome::Forwarded(TelemetryKind::Power));
    mock.assert_async().await;
}

#[tokio::test]
async fn invalid_json_produces_no_http_call() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let buffer = Arc::new(MessageBuffer::new(10));
    let router = router(server.url(), &buffer);
    let outcome = router.dispatch("battery/discharge", b"{discharge: ").await;

    assert!(matches!(outcome, DispatchOutcome::Rejected(_)));
    assert_eq!(buffer.len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn peer_rejection_is_dropped() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/write/charge")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let buffer = Arc::new(MessageBuffer::new(10));
    let outcome = router(server.url(), &buffer)
        .dispatch("battery/charge", br#"{"charge": 1}"#)
        .await;

    assert_eq!(outcome, DispatchOutcome::ForwardFailed(TelemetryKind::Charge));
    mock.assert_async().await;
}
