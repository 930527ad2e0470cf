use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ApiFamily;
use crate::retry::is_retryable_http_error;

#[derive(Debug, Error)]
pub enum DifyApiError {
    /// Required credential or URL is absent. Raised before any request.
    #[error("{family} API is not configured: missing {missing}")]
    Configuration {
        family: ApiFamily,
        missing: &'static str,
    },

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// DNS, connection reset, timeout and other transport-level failures.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with a status of 400 or above.
    #[error("HTTP {status} {message}")]
    HttpStatus {
        status: StatusCode,
        message: String,
        body: String,
    },

    #[error("invalid response body: {0}")]
    InvalidResponse(String),

    #[error("{}", stream_failed_message(.code, .message))]
    StreamFailed {
        code: Option<String>,
        message: String,
    },

    #[error("request was cancelled")]
    Cancelled,
}

impl DifyApiError {
    pub(crate) fn configuration(family: ApiFamily, missing: &'static str) -> Self {
        Self::Configuration { family, missing }
    }

    /// Status code of an HTTP rejection, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a caller may reasonably retry the same call.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::HttpStatus { status, body, .. } => {
                is_retryable_http_error(status.as_u16(), body)
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for DifyApiError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidResponse(error.to_string())
    }
}

/// Structured, user-facing document upload failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("upload failed ({code}, status {status}): {message}")]
pub struct UploadError {
    pub code: String,
    pub message: String,
    pub status: u16,
}

impl UploadError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }
}

/// Error body shape used by the service: `{"code", "message", "status"}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}

impl ErrorBody {
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str::<Self>(body).ok()
    }

    pub fn non_empty_message(&self) -> Option<&str> {
        self.message.as_deref().and_then(non_empty_string)
    }

    pub fn non_empty_code(&self) -> Option<&str> {
        self.code.as_deref().and_then(non_empty_string)
    }
}

/// Human-readable message for a rejected request.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Some(parsed) = ErrorBody::parse(body) {
        if let Some(message) = parsed.non_empty_message() {
            return match parsed.non_empty_code() {
                Some(code) => format!("{code}: {message}"),
                None => message.to_owned(),
            };
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

fn stream_failed_message(code: &Option<String>, message: &str) -> String {
    match code.as_deref() {
        Some(code) if !code.trim().is_empty() => format!("stream failed ({code}): {message}"),
        _ => format!("stream failed: {message}"),
    }
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
