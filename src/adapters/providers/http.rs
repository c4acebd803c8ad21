//! HTTP provider adapters.
//!
//! Thin JSON-over-POST clients for the transformation and scoring
//! services. Deliberately free of retry and throttling logic: the loop
//! owns backoff, timeouts, and the shared provider gate, so an adapter's
//! only jobs are transport and honest error classification.
//!
//! Status mapping: `429` and any `5xx` are transient (the service may
//! recover), every other non-success is fatal. Response bodies ride along
//! in the error text for the audit trail.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client as ReqwestClient, Response, StatusCode};
use tracing::{debug, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult, ProviderError};
use crate::domain::models::{MetricBundle, ProviderConfig};
use crate::domain::ports::{
    ScoreProvider, ScoreRequest, TransformProvider, TransformRequest, TransformResponse,
};

/// Build the shared reqwest client for both adapters.
///
/// The bearer token is read from the environment variable named in the
/// configuration at construction time; an absent variable means the
/// endpoints are called unauthenticated (local providers usually are).
fn build_client(config: &ProviderConfig, timeout_secs: u64) -> DomainResult<ReqwestClient> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );

    match std::env::var(&config.api_key_env) {
        Ok(token) if !token.trim().is_empty() => {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| {
                    DomainError::Configuration(format!(
                        "value of {} is not a valid header",
                        config.api_key_env
                    ))
                })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        _ => {
            warn!(
                env = %config.api_key_env,
                "api key variable unset, calling providers unauthenticated"
            );
        }
    }

    ReqwestClient::builder()
        .pool_max_idle_per_host(10)
        .timeout(Duration::from_secs(timeout_secs))
        .tcp_nodelay(true)
        .default_headers(headers)
        .build()
        .map_err(|e| DomainError::Configuration(format!("failed to build http client: {e}")))
}

/// Classify a non-success response, preserving the body text.
async fn error_from_response(operation: &str, response: Response) -> ProviderError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "failed to read error response".to_string());

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ProviderError::Transient(format!("{operation} returned {status}: {body}"))
    } else {
        ProviderError::Fatal(format!("{operation} returned {status}: {body}"))
    }
}

fn send_error(operation: &str, err: &reqwest::Error) -> ProviderError {
    // Connection resets and client-side timeouts are worth retrying.
    ProviderError::Transient(format!("{operation} request failed: {err}"))
}

/// Transformation service over JSON POST.
pub struct HttpTransformProvider {
    client: ReqwestClient,
    url: String,
}

impl HttpTransformProvider {
    /// Connect to the configured transform endpoint.
    pub fn new(config: &ProviderConfig, timeout_secs: u64) -> DomainResult<Self> {
        debug!(url = %config.transform_url, "initializing transform provider");
        Ok(Self {
            client: build_client(config, timeout_secs)?,
            url: config.transform_url.clone(),
        })
    }
}

#[async_trait]
impl TransformProvider for HttpTransformProvider {
    fn name(&self) -> &'static str {
        "http-transformer"
    }

    #[instrument(
        skip(self, request),
        fields(section = %request.section, strategy = %request.strategy, iteration = request.iteration)
    )]
    async fn transform(
        &self,
        request: &TransformRequest,
    ) -> Result<TransformResponse, ProviderError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| send_error("transform", &e))?;

        if !response.status().is_success() {
            return Err(error_from_response("transform", response).await);
        }
        response
            .json::<TransformResponse>()
            .await
            .map_err(|e| ProviderError::Fatal(format!("malformed transform response: {e}")))
    }
}

/// Scoring service over JSON POST.
///
/// Metric validation happens at deserialization: a bundle with any field
/// outside `[0, 1]` never reaches the loop, it becomes a fatal error here.
pub struct HttpScoreProvider {
    client: ReqwestClient,
    url: String,
}

impl HttpScoreProvider {
    /// Connect to the configured score endpoint.
    pub fn new(config: &ProviderConfig, timeout_secs: u64) -> DomainResult<Self> {
        debug!(url = %config.score_url, "initializing score provider");
        Ok(Self {
            client: build_client(config, timeout_secs)?,
            url: config.score_url.clone(),
        })
    }
}

#[async_trait]
impl ScoreProvider for HttpScoreProvider {
    fn name(&self) -> &'static str {
        "http-scorer"
    }

    #[instrument(skip(self, request), fields(section = %request.section))]
    async fn score(&self, request: &ScoreRequest) -> Result<MetricBundle, ProviderError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| send_error("score", &e))?;

        if !response.status().is_success() {
            return Err(error_from_response("score", response).await);
        }
        response
            .json::<MetricBundle>()
            .await
            .map_err(|e| ProviderError::Fatal(format!("malformed score response: {e}")))
    }
}
