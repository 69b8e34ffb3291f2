// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Gateway routes.
//
// GET  /health            liveness, no auth
// POST /print-url         {imageUrl, useHighQuality}
// POST /print             raw image bytes, ?highQuality=
// GET  /printers          reported devices and what resolution would pick
// GET  /config            registry contents
// PUT  /config/profiles   upsert a device profile
// PUT  /config/default    {name}
// POST /reconcile         reconcile every reported device

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use pressgate_core::types::{
    DeviceProfile, FailureKind, ImageSource, JobResult, PrintRequest, RegistryState,
    SubmissionKey,
};
use pressgate_print::gateway_client::{IDEMPOTENCY_HEADER, PrintAccepted, PrintRejected, PrintUrlBody};
use pressgate_print::{ReconcileOutcome, Resolution};

use crate::auth::Authorized;
use crate::error::{AppError, AppResult, status_for};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/print-url", post(print_url))
        .route("/print", post(print_bytes))
        .route("/printers", get(printers))
        .route("/config", get(get_config))
        .route("/config/profiles", put(put_profile))
        .route("/config/default", put(put_default))
        .route("/reconcile", post(reconcile))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "mode": state.engine.mode() }))
}

async fn print_url(
    _auth: Authorized,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PrintUrlBody>,
) -> AppResult<Response> {
    if body.image_url.trim().is_empty() {
        return Err(AppError::BadRequest("imageUrl is required".into()));
    }
    let request = with_key(
        PrintRequest::new(ImageSource::Url(body.image_url), body.use_high_quality),
        &headers,
    );
    Ok(print_response(state.engine.print(request).await))
}

#[derive(Debug, Deserialize)]
struct PrintQuery {
    #[serde(rename = "highQuality", default)]
    high_quality: bool,
}

async fn print_bytes(
    _auth: Authorized,
    State(state): State<AppState>,
    Query(query): Query<PrintQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    if body.is_empty() {
        return Err(AppError::BadRequest("request body must contain an image".into()));
    }
    let request = with_key(
        PrintRequest::new(ImageSource::Bytes(body.to_vec()), query.high_quality),
        &headers,
    );
    Ok(print_response(state.engine.print(request).await))
}

fn with_key(request: PrintRequest, headers: &HeaderMap) -> PrintRequest {
    match headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        Some(key) => request.with_key(SubmissionKey(key.to_string())),
        None => request,
    }
}

fn print_response(result: JobResult) -> Response {
    if result.success {
        let body = PrintAccepted {
            success: true,
            printer: result.device_name.unwrap_or_default(),
            job_id: result.job_id.unwrap_or_default(),
            high_quality: result.high_fidelity_used,
        };
        return (StatusCode::OK, Json(body)).into_response();
    }

    let kind = result.failure.unwrap_or(FailureKind::SubmissionFailed);
    let body = PrintRejected {
        error: result.error_message.unwrap_or_else(|| "print failed".into()),
        printer: result.device_name,
        kind: Some(kind),
    };
    (status_for(kind), Json(body)).into_response()
}

#[derive(Debug, Serialize)]
struct PrintersResponse {
    devices: Vec<String>,
    /// Configured profile names, highest priority first.
    profiles: Vec<String>,
    resolved: Option<Resolution>,
}

async fn printers(_auth: Authorized, State(state): State<AppState>) -> AppResult<Json<PrintersResponse>> {
    let devices = state.engine.available_devices().await?;
    let registry = state.engine.registry_state().await;
    let resolved = pressgate_print::resolve(&devices, &registry);
    let profiles = registry
        .profiles_by_priority()
        .into_iter()
        .map(|p| p.name.clone())
        .collect();
    Ok(Json(PrintersResponse {
        devices,
        profiles,
        resolved,
    }))
}

async fn get_config(_auth: Authorized, State(state): State<AppState>) -> Json<RegistryState> {
    Json(state.engine.registry_state().await)
}

async fn put_profile(
    _auth: Authorized,
    State(state): State<AppState>,
    Json(profile): Json<DeviceProfile>,
) -> AppResult<Json<RegistryState>> {
    if profile.name.trim().is_empty() {
        return Err(AppError::BadRequest("profile name is required".into()));
    }
    Ok(Json(state.engine.upsert_profile(profile).await?))
}

#[derive(Debug, Deserialize)]
struct DefaultBody {
    name: String,
}

async fn put_default(
    _auth: Authorized,
    State(state): State<AppState>,
    Json(body): Json<DefaultBody>,
) -> AppResult<Json<RegistryState>> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    Ok(Json(state.engine.set_default_device(body.name).await?))
}

async fn reconcile(
    _auth: Authorized,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ReconcileOutcome>>> {
    Ok(Json(state.engine.reconcile(&[]).await?))
}
