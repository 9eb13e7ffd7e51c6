use std::sync::Arc;
use std::time::Duration;

use estation_domain::{ApiConfig, EstationError, Result};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::session::SessionStore;

/// HTTP client with built-in retry and timeout support.
///
/// One logical call covers up to `retry_attempts` physical attempts. Only
/// transport-level failures (no HTTP response obtained) are retried; a 401
/// purges the session credential and fails with `AuthenticationRequired`,
/// and any other non-2xx status is returned verbatim as `HttpStatus`. The
/// wait before attempt `n + 1` is `retry_backoff * n`, deterministic given
/// the attempt number.
#[derive(Clone)]
pub struct ApiClient {
    client: ReqwestClient,
    base_url: String,
    session: Arc<dyn SessionStore>,
    session_key: String,
    retry_attempts: u32,
    retry_backoff: Duration,
    request_timeout: Duration,
}

impl ApiClient {
    /// Build a client from the API configuration.
    ///
    /// The per-attempt timeout is enforced by the underlying connector and
    /// aborts the in-flight request when exceeded.
    pub fn new(
        config: &ApiConfig,
        session_key: impl Into<String>,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        url::Url::parse(&config.base_url)
            .map_err(|e| EstationError::Config(format!("Invalid API base URL: {e}")))?;

        let client = ReqwestClient::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EstationError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
            session_key: session_key.into(),
            retry_attempts: config.retry_attempts.max(1),
            retry_backoff: config.retry_backoff,
            request_timeout: config.request_timeout,
        })
    }

    /// Perform one logical request and decode the JSON response body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let response = self.execute(method, endpoint, body, None).await?;
        Self::decode(response).await
    }

    /// Perform one logical request with caller headers merged over the
    /// default header set.
    pub async fn request_with<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
        headers: HeaderMap,
    ) -> Result<T> {
        let response = self.execute(method, endpoint, body, Some(headers)).await?;
        Self::decode(response).await
    }

    /// Perform one logical request where the response body is irrelevant
    /// (logout, deletes). The body is drained and discarded.
    pub async fn request_unit(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<()> {
        let response = self.execute(method, endpoint, body, None).await?;
        // Drain so the connection can be reused.
        let _ = response.bytes().await;
        Ok(())
    }

    /// GET convenience.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.request(Method::GET, endpoint, None).await
    }

    /// POST convenience.
    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        self.request(Method::POST, endpoint, Some(body)).await
    }

    /// PUT convenience.
    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        self.request(Method::PUT, endpoint, Some(body)).await
    }

    /// POST convenience for endpoints that take no request body.
    pub async fn post_empty<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.request(Method::POST, endpoint, None).await
    }

    /// POST convenience for endpoints whose response body is irrelevant.
    pub async fn post_unit(&self, endpoint: &str, body: Option<&serde_json::Value>) -> Result<()> {
        self.request_unit(Method::POST, endpoint, body).await
    }

    /// DELETE convenience; most delete endpoints return an empty body.
    pub async fn delete(&self, endpoint: &str) -> Result<()> {
        self.request_unit(Method::DELETE, endpoint, None).await
    }

    /// Single-attempt GET against an absolute URL, outside the retry and
    /// auth envelope. Used for direct-backend development probes.
    pub async fn get_absolute<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.client.get(url).send().await.map_err(|e| self.classify(&e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EstationError::HttpStatus { code: status.as_u16() });
        }
        Self::decode(response).await
    }

    /// The retry loop shared by every logical request.
    ///
    /// Explicit loop with an attempt counter rather than recursion, so a
    /// large retry limit cannot grow the call stack.
    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
        headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, endpoint);

        for attempt in 1..=self.retry_attempts {
            let mut builder = self
                .client
                .request(method.clone(), &url)
                .header(CONTENT_TYPE, "application/json");

            // Read the credential fresh on every attempt; it may have been
            // replaced or purged since the last one.
            match self.session.get(&self.session_key) {
                Ok(Some(token)) => builder = builder.bearer_auth(token),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Session store read failed; sending unauthenticated"),
            }

            if let Some(extra) = &headers {
                builder = builder.headers(extra.clone());
            }
            if let Some(json) = body {
                builder = builder.json(json);
            }

            debug!(%method, %url, attempt, "Sending HTTP request");

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!(%method, %url, %status, attempt, "Received HTTP response");

                    if status == StatusCode::UNAUTHORIZED {
                        if let Err(e) = self.session.delete(&self.session_key) {
                            warn!(error = %e, "Failed to purge session credential after 401");
                        }
                        return Err(EstationError::AuthenticationRequired);
                    }
                    if !status.is_success() {
                        return Err(EstationError::HttpStatus { code: status.as_u16() });
                    }
                    return Ok(response);
                }
                Err(err) => {
                    let failure = self.classify(&err);
                    if attempt < self.retry_attempts {
                        let delay = self.backoff_delay(attempt);
                        warn!(
                            %method, %url, attempt, error = %failure,
                            "Transport failure, retrying after {:?}", delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    warn!(%method, %url, attempt, error = %failure, "Retry attempts exhausted");
                    return Err(failure);
                }
            }
        }

        Err(EstationError::Transport("HTTP client produced no attempts".to_string()))
    }

    /// Wait before the attempt following attempt `attempt`: a linear ramp
    /// of `retry_backoff * attempt`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(attempt)
    }

    /// Map a connector error into the transport taxonomy. Timeout-triggered
    /// aborts are a specialization of transport failure and stay eligible
    /// for retry.
    fn classify(&self, err: &reqwest::Error) -> EstationError {
        if err.is_timeout() {
            EstationError::Timeout { elapsed_ms: self.request_timeout.as_millis() as u64 }
        } else {
            EstationError::Transport(err.to_string())
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| EstationError::Serialization(format!("Failed to decode response: {e}")))
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_backoff", &self.retry_backoff)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
