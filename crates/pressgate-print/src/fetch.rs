// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Downloads URL image sources before rendering.

use std::time::Duration;

use tracing::{debug, instrument};

use pressgate_core::error::{PressgateError, Result};

/// HTTP(S) downloader with a size cap.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl SourceFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PressgateError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self::with_client(client, max_bytes))
    }

    pub fn with_client(client: reqwest::Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }

    /// Fetch `url`. Every failure is reported as `SourceUnavailable`.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(PressgateError::SourceUnavailable(format!(
                "unsupported URL scheme: {url}"
            )));
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PressgateError::SourceUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PressgateError::SourceUnavailable(format!(
                "{url} returned {status}"
            )));
        }
        if let Some(len) = response.content_length()
            && len > self.max_bytes as u64
        {
            return Err(self.too_large(url));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| PressgateError::SourceUnavailable(format!("{url}: {e}")))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }
        if body.is_empty() {
            return Err(PressgateError::SourceUnavailable(format!(
                "{url} returned an empty body"
            )));
        }

        debug!(bytes = body.len(), "source fetched");
        Ok(body)
    }

    fn too_large(&self, url: &str) -> PressgateError {
        PressgateError::SourceUnavailable(format!(
            "{url} exceeds the {} byte limit",
            self.max_bytes
        ))
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn fetcher(max_bytes: usize) -> SourceFetcher {
        SourceFetcher::new(Duration::from_secs(5), max_bytes).unwrap()
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let err = fetcher(1024).fetch("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, PressgateError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn fetches_body() {
        let base = serve(Router::new().route("/img", get(|| async { vec![1u8, 2, 3] }))).await;
        let body = fetcher(1024).fetch(&format!("{base}/img")).await.unwrap();
        assert_eq!(body, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn non_success_status_is_unavailable() {
        let base = serve(Router::new().route("/gone", get(|| async { StatusCode::NOT_FOUND }))).await;
        let err = fetcher(1024).fetch(&format!("{base}/gone")).await.unwrap_err();
        assert_eq!(
            err.failure_kind(),
            pressgate_core::types::FailureKind::SourceUnavailable
        );
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let base = serve(Router::new().route("/big", get(|| async { vec![0u8; 4096] }))).await;
        let err = fetcher(1024).fetch(&format!("{base}/big")).await.unwrap_err();
        assert!(err.to_string().contains("byte limit"));
    }
}
