// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP error type for gateway handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use pressgate_core::error::PressgateError;
use pressgate_core::types::FailureKind;

/// Error returned by handlers; renders as `{error, kind}` JSON.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] PressgateError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// HTTP status for a failed print outcome.
pub fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::NoDeviceAvailable => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::SourceUnavailable => StatusCode::FAILED_DEPENDENCY,
        FailureKind::RenderFailure => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::SubmissionTimeout => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::SubmissionFailed | FailureKind::TransportFailure => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            AppError::Engine(err) => match err {
                PressgateError::InvalidConfig(msg) => {
                    (StatusCode::BAD_REQUEST, "invalidConfig", msg.clone())
                }
                PressgateError::ConfigUnavailable(_)
                | PressgateError::Io(_)
                | PressgateError::Serialization(_) => {
                    tracing::error!(error = %err, "internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal",
                        "an internal error occurred".to_string(),
                    )
                }
                PressgateError::ReconcileFailure { .. } => {
                    (StatusCode::BAD_GATEWAY, "reconcileFailure", err.to_string())
                }
                other => {
                    let kind = other.failure_kind();
                    (status_for(kind), kind_name(kind), other.to_string())
                }
            },
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "badRequest", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
        };

        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}

fn kind_name(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::NoDeviceAvailable => "noDeviceAvailable",
        FailureKind::SourceUnavailable => "sourceUnavailable",
        FailureKind::RenderFailure => "renderFailure",
        FailureKind::SubmissionTimeout => "submissionTimeout",
        FailureKind::SubmissionFailed => "submissionFailed",
        FailureKind::TransportFailure => "transportFailure",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kinds_map_to_statuses() {
        assert_eq!(status_for(FailureKind::NoDeviceAvailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(FailureKind::SubmissionTimeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(FailureKind::SourceUnavailable), StatusCode::FAILED_DEPENDENCY);
    }

    #[test]
    fn kind_names_match_serialized_form() {
        for kind in [
            FailureKind::NoDeviceAvailable,
            FailureKind::SourceUnavailable,
            FailureKind::RenderFailure,
            FailureKind::SubmissionTimeout,
            FailureKind::SubmissionFailed,
            FailureKind::TransportFailure,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind_name(kind));
        }
    }

    #[test]
    fn unauthorized_is_401() {
        let response = AppError::Unauthorized("missing token".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
