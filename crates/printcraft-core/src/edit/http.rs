//! HTTP client for the pixel-transformation endpoints.
//!
//! Each operation is a `POST {base_url}/{operation}` with a JSON
//! [`TransformRequest`] body. The client carries one overall timeout so a
//! stuck call surfaces as a retryable [`ServiceError::Timeout`] instead of
//! hanging the pipeline.

use std::time::Duration;

use super::service::{PixelTransformService, ServiceError, TransformRequest, TransformResponse};
use crate::config::PipelineConfig;

/// `reqwest`-backed [`PixelTransformService`].
#[derive(Debug, Clone)]
pub struct HttpTransformService {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransformService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Network(format!("client setup: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Client with the timeout from `config`.
    pub fn from_config(base_url: impl Into<String>, config: &PipelineConfig) -> Result<Self, ServiceError> {
        Self::new(base_url, config.service_timeout())
    }

    fn endpoint(&self, request: &TransformRequest) -> String {
        format!("{}/{}", self.base_url, request.operation.as_str())
    }

    fn map_reqwest_error(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout(self.timeout)
        } else if err.is_decode() {
            ServiceError::MalformedResponse(err.to_string())
        } else {
            ServiceError::Network(err.to_string())
        }
    }
}

impl PixelTransformService for HttpTransformService {
    async fn transform(&self, request: TransformRequest) -> Result<TransformResponse, ServiceError> {
        let url = self.endpoint(&request);
        log::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ServiceError::RateLimited {
                retry_after: retry_after_hint(response.headers()),
            });
        }

        if !status.is_success() {
            // Error bodies usually carry a message in the same shape
            let message = response
                .json::<TransformResponse>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(if status.is_server_error() {
                ServiceError::Network(message)
            } else {
                ServiceError::Declined(message)
            });
        }

        response
            .json::<TransformResponse>()
            .await
            .map_err(|e| self.map_reqwest_error(e))
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ServiceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        if !response.status().is_success() {
            return Err(ServiceError::Network(format!(
                "fetching result failed: HTTP {}",
                response.status().as_u16()
            )));
        }

        let bytes = response.bytes().await.map_err(|e| self.map_reqwest_error(e))?;
        Ok(bytes.to_vec())
    }
}

fn retry_after_hint(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?;
    let secs = value.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}
