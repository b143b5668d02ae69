//! Delivery of backend requests with retry, backoff and a fallback transport.
//!
//! Every request is first sent as a JSON `POST`. Failed attempts are retried
//! with exponential backoff; once retries are exhausted the request is sent
//! one more time in a different shape (a `GET` query for reads, a form-encoded
//! `POST` for writes). Whatever goes wrong ends up as a [`RequestError`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use needlelog_core::{BackendRequest, SubmissionResult};
use reqwest::header::{ACCEPT, HeaderValue};

/// Substrings that mark a sign-in page instead of data.
const AUTH_MARKERS: [&str; 3] = ["Sign in", "authentication", "login"];

/// Substrings that mark an HTML page instead of data.
const MARKUP_MARKERS: [&str; 2] = ["<html", "<!DOCTYPE"];

/// Terminal failure of a request after retries and fallback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP error ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("authentication required by the backend")]
    Auth,
    #[error("invalid response format: {0}")]
    Format(String),
    #[error("received HTML instead of JSON; check the backend deployment")]
    Deployment,
}

impl RequestError {
    /// Failures that the same transport will keep producing.
    pub fn is_structural(&self) -> bool {
        matches!(self, RequestError::Auth | RequestError::Deployment)
    }
}

/// Classify a response body that did not parse as a result envelope.
pub fn classify_body(body: &str) -> RequestError {
    if AUTH_MARKERS.iter().any(|m| body.contains(m)) {
        return RequestError::Auth;
    }
    if MARKUP_MARKERS.iter().any(|m| body.contains(m)) {
        return RequestError::Deployment;
    }
    let preview: String = body.chars().take(200).collect();
    RequestError::Format(preview)
}

/// Turn a raw response into a result envelope or a classified failure.
pub fn interpret(response: RawResponse) -> Result<SubmissionResult, RequestError> {
    if response.status == 401 {
        return Err(RequestError::Auth);
    }
    if !(200..300).contains(&response.status) {
        return Err(RequestError::Http {
            status: response.status,
            body: response.body,
        });
    }
    serde_json::from_str::<SubmissionResult>(&response.body)
        .map_err(|_| classify_body(&response.body))
}

/// How a request is put on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Shape {
    /// `POST` with the request as a JSON body.
    Json,
    /// `GET` with `action` (and `date`) as query parameters.
    Query,
    /// `POST` with a single form field `data` holding the JSON request.
    Form,
}

impl Shape {
    /// The fallback shape for a request.
    pub fn fallback_for(request: &BackendRequest) -> Shape {
        if request.action().is_read() {
            Shape::Query
        } else {
            Shape::Form
        }
    }
}

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Moves a request to the backend and returns the raw response.
///
/// An `Err` means no response was received at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        endpoint: &str,
        shape: Shape,
        request: &BackendRequest,
    ) -> Result<RawResponse, String>;
}

/// [`Transport`] over `reqwest`.
///
/// No cookie store, redirects followed, optional bearer token.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(token: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client, token })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        shape: Shape,
        request: &BackendRequest,
    ) -> Result<RawResponse, String> {
        let mut req = match shape {
            Shape::Json => self.client.post(endpoint).json(request),
            Shape::Query => {
                let pairs = request
                    .query_pairs()
                    .ok_or_else(|| format!("{} has no query form", request.action()))?;
                self.client.get(endpoint).query(&pairs)
            }
            Shape::Form => {
                let data = serde_json::to_string(request).map_err(|e| e.to_string())?;
                self.client.post(endpoint).form(&[("data", data)])
            }
        };

        req = req.header(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| e.to_string())?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| e.to_string())?;
        Ok(RawResponse { status, body })
    }
}

/// Retry behavior of the [`RequestClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub base_delay: Duration,
    /// Replay once in the fallback shape after retries are exhausted.
    pub use_fallback: bool,
    /// Keep retrying auth and deployment failures instead of going
    /// straight to the fallback.
    pub retry_structural: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            use_fallback: true,
            retry_structural: false,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `k` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1u32.checked_shl(retry).unwrap_or(u32::MAX))
    }
}

/// Sends requests to the configured endpoint.
#[derive(Clone)]
pub struct RequestClient {
    endpoint: String,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RequestClient {
    pub fn new(endpoint: impl Into<String>, transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport,
            policy,
        }
    }

    /// Client over HTTP with an optional bearer token.
    pub fn http(endpoint: impl Into<String>, token: Option<String>, policy: RetryPolicy) -> anyhow::Result<Self> {
        Ok(Self::new(endpoint, Arc::new(HttpTransport::new(token)?), policy))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn send(&self, request: &BackendRequest) -> Result<SubmissionResult, RequestError> {
        self.send_to(&self.endpoint, request).await
    }

    /// Deliver `request` to `endpoint`.
    ///
    /// A `success = false` envelope is returned as `Ok`; only failures to get
    /// an envelope at all become errors.
    pub async fn send_to(
        &self,
        endpoint: &str,
        request: &BackendRequest,
    ) -> Result<SubmissionResult, RequestError> {
        let action = request.action();
        let max_retries = self.policy.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match self.attempt(endpoint, Shape::Json, request).await {
                Ok(result) => {
                    if attempt > 0 {
                        tracing::info!(%action, attempt = attempt + 1, "request succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    tracing::warn!(%action, attempt = attempt + 1, error = %err, "request attempt failed");
                    let structural = err.is_structural() && !self.policy.retry_structural;
                    last_error = Some(err);
                    if structural {
                        tracing::debug!(%action, "structural failure; skipping remaining retries");
                        break;
                    }
                    if attempt < max_retries {
                        let delay = self.policy.delay_for(attempt);
                        tracing::debug!(%action, ?delay, "retrying after backoff");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let primary_error = last_error.unwrap_or_else(|| RequestError::Network("no attempt made".to_string()));
        if !self.policy.use_fallback {
            return Err(primary_error);
        }

        let shape = Shape::fallback_for(request);
        tracing::info!(%action, ?shape, "trying fallback transport");
        match self.attempt(endpoint, shape, request).await {
            Ok(result) => Ok(result),
            Err(err) => {
                tracing::error!(%action, error = %err, primary = %primary_error, "fallback transport also failed");
                Err(err)
            }
        }
    }

    /// Single JSON attempt with no retry or fallback.
    pub async fn probe(&self) -> Result<SubmissionResult, RequestError> {
        self.attempt(&self.endpoint, Shape::Json, &BackendRequest::Test).await
    }

    async fn attempt(
        &self,
        endpoint: &str,
        shape: Shape,
        request: &BackendRequest,
    ) -> Result<SubmissionResult, RequestError> {
        let response = self
            .transport
            .send(endpoint, shape, request)
            .await
            .map_err(RequestError::Network)?;
        interpret(response)
    }
}
