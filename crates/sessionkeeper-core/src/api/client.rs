//! HTTP transport for login requests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use super::ApiError;
use crate::auth::Credentials;

/// HTTP request timeout in seconds.
/// 30s allows for slow backends while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Something that can carry a login request to the backend.
///
/// The controller only ever talks to this trait, so tests and embedders can
/// swap the network out.
#[async_trait]
pub trait LoginTransport: Send + Sync {
    /// POST to `url` with `headers` and no body, returning the credentials
    /// parsed from the response.
    async fn post_login(&self, url: &str, headers: header::HeaderMap)
        -> Result<Credentials, ApiError>;
}

/// reqwest-backed login transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    /// Reuse an existing client and its connection pool
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl LoginTransport for HttpTransport {
    async fn post_login(
        &self,
        url: &str,
        headers: header::HeaderMap,
    ) -> Result<Credentials, ApiError> {
        debug!(url, "Sending login request");

        let response = self
            .client
            .post(url)
            .headers(headers)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let response = Self::check_response(response).await?;

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse login response: {}", e)))
    }
}
