// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Remote dispatch: forward print requests to a Pressgate gateway over HTTP.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use pressgate_core::error::{PressgateError, Result};
use pressgate_core::types::{FailureKind, ImageSource, JobResult, PrintRequest, SubmissionKey};

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Body of `POST /print-url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintUrlBody {
    pub image_url: String,
    #[serde(default)]
    pub use_high_quality: bool,
}

/// 2xx response from the gateway's print routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintAccepted {
    pub success: bool,
    pub printer: String,
    pub job_id: String,
    pub high_quality: bool,
}

/// Error response from the gateway's print routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintRejected {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

/// HTTP client for one gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PressgateError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self::with_client(client, base_url, token))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward `request` to the gateway. Never returns an error: failures are
    /// folded into the `JobResult`.
    #[instrument(skip(self, request), fields(base = %self.base_url, key = %key))]
    pub async fn submit(&self, request: &PrintRequest, key: &SubmissionKey) -> JobResult {
        let hf = request.prefer_high_fidelity;
        let builder = match &request.source {
            ImageSource::Url(url) => self
                .client
                .post(format!("{}/print-url", self.base_url))
                .json(&PrintUrlBody {
                    image_url: url.clone(),
                    use_high_quality: hf,
                }),
            ImageSource::Bytes(bytes) => self
                .client
                .post(format!("{}/print", self.base_url))
                .query(&[("highQuality", hf)])
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes.clone()),
        };
        let mut builder = builder.header(IDEMPOTENCY_HEADER, key.as_str());
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "gateway unreachable");
                let err = PressgateError::TransportFailure(e.to_string());
                return JobResult::failed(None, &err, hf, key.clone());
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let err = PressgateError::TransportFailure(format!("reading response: {e}"));
                return JobResult::failed(None, &err, hf, key.clone());
            }
        };

        if status.is_success() {
            match serde_json::from_str::<PrintAccepted>(&body) {
                Ok(accepted) if accepted.success => {
                    info!(printer = %accepted.printer, job_id = %accepted.job_id, "gateway accepted job");
                    JobResult::accepted(
                        accepted.printer,
                        accepted.job_id,
                        accepted.high_quality,
                        hf,
                        key.clone(),
                    )
                }
                _ => rejected(&body, status, hf, key),
            }
        } else {
            rejected(&body, status, hf, key)
        }
    }
}

/// Map an error body to a failed result, keeping the gateway's message as-is.
fn rejected(body: &str, status: reqwest::StatusCode, hf: bool, key: &SubmissionKey) -> JobResult {
    match serde_json::from_str::<PrintRejected>(body) {
        Ok(rejected) => {
            warn!(%status, error = %rejected.error, "gateway rejected job");
            let err = PressgateError::TransportFailure(rejected.error.clone());
            let mut result = JobResult::failed(rejected.printer, &err, hf, key.clone());
            result.error_message = Some(rejected.error);
            result.failure = Some(rejected.kind.unwrap_or(FailureKind::TransportFailure));
            result
        }
        Err(_) => {
            let err = PressgateError::TransportFailure(format!("gateway returned {status}: {}", body.trim()));
            warn!(error = %err, "unparseable gateway response");
            JobResult::failed(None, &err, hf, key.clone())
        }
    }
}
