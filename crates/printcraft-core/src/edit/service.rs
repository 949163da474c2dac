//! The pixel-transformation service seam and its wire types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External capabilities the dispatcher can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// Isolate the subject and make the background transparent.
    RemoveBackground,
    /// Remove the masked region and fill it following an instruction.
    FillMasked,
    /// Structurally erase the masked object.
    EraseMasked,
    /// Reduce the raster to a small color palette.
    ReducePalette,
}

impl OperationKind {
    /// Stable name used in endpoints and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RemoveBackground => "remove-background",
            Self::FillMasked => "fill-masked",
            Self::EraseMasked => "erase-masked",
            Self::ReducePalette => "reduce-palette",
        }
    }

    pub fn requires_mask(self) -> bool {
        matches!(self, Self::FillMasked | Self::EraseMasked)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body sent to a pixel-transformation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    pub operation: OperationKind,
    /// Full-resolution raster as an image data URI.
    pub image: String,
    /// Same-resolution binary mask as an image data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    /// Free-text fill instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Target palette size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<u16>,
}

/// Body returned by a pixel-transformation endpoint.
///
/// Services answer either with an `output` (a single reference or a list
/// whose first entry is the result) or with an `error`; some also set an
/// explicit `success` flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformResponse {
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
}

impl TransformResponse {
    /// Successful response carrying a single output reference.
    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            output: Some(serde_json::Value::String(output.into())),
            error: None,
            success: Some(true),
        }
    }

    /// Failure response carrying an error message.
    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            output: None,
            error: Some(message.into()),
            success: Some(false),
        }
    }

    /// Interpret the response. An explicit failure flag or error field
    /// wins over any output that may also be present.
    pub fn into_image_ref(self) -> Result<ImageRef, ServiceError> {
        if self.success == Some(false) || self.error.is_some() {
            return Err(ServiceError::Declined(
                self.error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "operation failed".to_string()),
            ));
        }

        let output = match self.output {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .find_map(|v| v.as_str().map(str::to_string))
                .ok_or_else(|| ServiceError::MalformedResponse("output list has no string entry".to_string()))?,
            Some(other) => {
                return Err(ServiceError::MalformedResponse(format!(
                    "unexpected output type: {}",
                    other
                )))
            }
            None => return Err(ServiceError::MalformedResponse("response has no output".to_string())),
        };

        ImageRef::parse(&output)
            .ok_or_else(|| ServiceError::MalformedResponse(format!("output is not an image reference: {:.64}", output)))
    }
}

/// Reference to an image held elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ImageRef {
    /// Remote image, fetched through the service.
    Url(String),
    /// Embedded image data, decoded locally.
    DataUri(String),
}

impl ImageRef {
    /// Classify a string as an image reference.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.starts_with("data:image/") {
            Some(Self::DataUri(s.to_string()))
        } else if s.starts_with("https://") || s.starts_with("http://") || s.starts_with("blob:") {
            Some(Self::Url(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(s) | Self::DataUri(s) => s,
        }
    }
}

impl From<ImageRef> for String {
    fn from(r: ImageRef) -> Self {
        match r {
            ImageRef::Url(s) | ImageRef::DataUri(s) => s,
        }
    }
}

impl TryFrom<String> for ImageRef {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("not an image reference: {:.64}", s))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(s) => f.write_str(s),
            // Data URIs are far too long to log
            Self::DataUri(s) => write!(f, "{:.32}... ({} bytes)", s, s.len()),
        }
    }
}

/// Failures of an external pixel-transformation call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request declined by the service: {0}")]
    Declined(String),

    #[error("Malformed service response: {0}")]
    MalformedResponse(String),

    #[error("Service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Rate limited by the service")]
    RateLimited { retry_after: Option<Duration> },
}

impl ServiceError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. }
        )
    }
}

/// An external pixel-transformation capability.
///
/// Implementations perform network I/O; a call may take several seconds.
#[allow(async_fn_in_trait)]
pub trait PixelTransformService {
    /// Run one operation and return the service's raw answer.
    ///
    /// Transport problems and non-success statuses are errors; a
    /// success-shaped body carrying a failure is returned as is.
    async fn transform(&self, request: TransformRequest) -> Result<TransformResponse, ServiceError>;

    /// Fetch the bytes of a result image by URL.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ServiceError>;
}
