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

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use fluxion_mqtt::BridgeStatus;
use fluxion_telemetry::{
    BusMessage, CommandService, MessageBuffer, ReadingRow, TelemetryError, TelemetryKind,
    TelemetryService,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use crate::api_error::ApiError;

type ApiResult<T> = Result<T, ApiError>;

/// Shared state for the HTTP handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub telemetry: Arc<TelemetryService>,
    pub commands: Arc<CommandService>,
    pub messages: Arc<MessageBuffer>,
    pub bridge_status: watch::Receiver<BridgeStatus>,
    /// Kind behind `/write` and `/livedata`
    pub primary_kind: TelemetryKind,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/read", get(read_handler))
        .route("/timeseries", get(timeseries_handler))
        .route("/write", post(write_primary_handler))
        .route("/write/{kind}", post(write_kind_handler))
        .route("/livedata", get(livedata_primary_handler))
        .route("/livedata/{kind}", get(livedata_kind_handler))
        .route("/current-soc", get(current_soc_handler))
        .route("/messages", get(messages_handler))
        .route("/setSOClimits", post(set_soc_limits_handler))
        .route("/setPower", post(set_power_handler))
        .route("/charge", post(charge_handler))
        .route("/discharge", post(discharge_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn parse_body(body: &Bytes) -> ApiResult<Value> {
    if body.is_empty() {
        return Err(TelemetryError::InvalidPayload("request body is empty".to_owned()).into());
    }
    serde_json::from_slice(body)
        .map_err(|e| TelemetryError::InvalidPayload(format!("malformed JSON body: {e}")).into())
}

fn parse_kind(raw: &str) -> ApiResult<TelemetryKind> {
    Ok(raw.parse::<TelemetryKind>()?)
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let bridge = *state.bridge_status.borrow();
    Json(json!({
        "status": "ok",
        "bridge": bridge,
        "buffered_messages": state.messages.len(),
    }))
}

#[derive(Debug, Deserialize)]
struct ReadParams {
    begin: Option<String>,
    end: Option<String>,
}

async fn read_handler(
    State(state): State<AppState>,
    Query(params): Query<ReadParams>,
) -> ApiResult<Json<Vec<ReadingRow>>> {
    let rows = state
        .telemetry
        .read(params.begin.as_deref(), params.end.as_deref())
        .await?;
    Ok(Json(rows))
}

async fn timeseries_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<ReadingRow>>> {
    let rows = state.telemetry.read(Some("-24h"), Some("now()")).await?;
    Ok(Json(rows))
}

async fn write(state: &AppState, kind: TelemetryKind, body: &Bytes) -> ApiResult<Json<Value>> {
    let body = parse_body(body)?;
    state.telemetry.write(kind, &body).await?;
    Ok(Json(json!({ "message": "Data written successfully" })))
}

async fn write_primary_handler(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    write(&state, state.primary_kind, &body).await
}

async fn write_kind_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let kind = parse_kind(&kind)?;
    write(&state, kind, &body).await
}

async fn livedata_primary_handler(State(state): State<AppState>) -> Json<Value> {
    Json(state.telemetry.cache().snapshot(state.primary_kind))
}

async fn livedata_kind_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Json<Value>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.telemetry.cache().snapshot(kind)))
}

async fn current_soc_handler(State(state): State<AppState>) -> Json<Value> {
    Json(state.telemetry.cache().snapshot(TelemetryKind::Soc))
}

async fn messages_handler(State(state): State<AppState>) -> Json<Vec<BusMessage>> {
    Json(state.messages.snapshot())
}

async fn set_soc_limits_handler(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body = parse_body(&body)?;
    let published = state.commands.publish_soc_limits(&body).await?;
    Ok(Json(json!({ "message": published.message })))
}

async fn setpoint(state: &AppState, kind: TelemetryKind, body: &Bytes) -> ApiResult<Json<Value>> {
    let body = parse_body(body)?;
    let published = state.commands.publish_setpoint(kind, &body).await?;
    Ok(Json(json!({ "message": published.message })))
}

async fn set_power_handler(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    setpoint(&state, TelemetryKind::Power, &body).await
}

async fn charge_handler(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    setpoint(&state, TelemetryKind::Charge, &body).await
}

async fn discharge_handler(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    setpoint(&state, TelemetryKind::Discharge, &body).await
}
