//! Error types for the X API client.

use serde::Deserialize;
use std::path::PathBuf;
use xbridge_core::ratelimit::DEFAULT_PENALTY_SECS;
use xbridge_core::{RateLimitHeaders, ToolError, UpstreamError};

/// Result type for client operations.
pub type XResult<T> = Result<T, XError>;

/// Errors that can occur when talking to the X API.
#[derive(Debug, thiserror::Error)]
pub enum XError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request signing failed.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// API returned a non-success status.
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        rate_limit: RateLimitHeaders,
    },

    /// API refused the request because of its rate limit.
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimited {
        retry_after: u64,
        rate_limit: RateLimitHeaders,
    },

    /// The addressed resource does not exist.
    #[error("Resource not found: {message}")]
    NotFound {
        message: String,
        rate_limit: RateLimitHeaders,
    },

    /// The request needs credentials that were not supplied.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A media file could not be read.
    #[error("Cannot read media file {}: {source}", path.display())]
    Media {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl XError {
    pub fn not_found(message: impl Into<String>, rate_limit: RateLimitHeaders) -> Self {
        Self::NotFound {
            message: message.into(),
            rate_limit,
        }
    }

    /// Rate-limit headers that came with the failed response, if any.
    pub fn rate_limit(&self) -> RateLimitHeaders {
        match self {
            Self::Api { rate_limit, .. }
            | Self::RateLimited { rate_limit, .. }
            | Self::NotFound { rate_limit, .. } => *rate_limit,
            _ => RateLimitHeaders::default(),
        }
    }

    /// Classify into the tool-level taxonomy.
    pub fn to_tool_error(&self) -> ToolError {
        match self {
            Self::Http(e) if e.is_decode() || e.is_builder() => ToolError::Client(e.to_string()),
            Self::Http(e) => ToolError::Transient(e.to_string()),
            Self::Json(e) => ToolError::Client(format!("Undecodable response: {}", e)),
            Self::OAuth(msg) | Self::MissingCredentials(msg) => ToolError::Auth(msg.clone()),
            Self::Api {
                status, message, ..
            } => match status {
                401 | 403 => ToolError::Auth(message.clone()),
                404 => ToolError::NotFound(message.clone()),
                429 => ToolError::RateLimited {
                    retry_after: DEFAULT_PENALTY_SECS,
                },
                500..=599 => ToolError::Transient(format!("status {}: {}", status, message)),
                _ => ToolError::Client(format!("status {}: {}", status, message)),
            },
            Self::RateLimited { retry_after, .. } => ToolError::RateLimited {
                retry_after: *retry_after,
            },
            Self::NotFound { message, .. } => ToolError::NotFound(message.clone()),
            Self::Config(_) | Self::InvalidUrl(_) | Self::Media { .. } => {
                ToolError::Client(self.to_string())
            }
        }
    }

    pub fn into_upstream(self) -> UpstreamError {
        UpstreamError::new(self.to_tool_error()).with_rate_limit(self.rate_limit())
    }
}

impl From<XError> for UpstreamError {
    fn from(error: XError) -> Self {
        error.into_upstream()
    }
}

/// Error bodies the API returns: v2 problem objects or v1.1 error lists.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl ErrorResponse {
    /// Best human-readable message in an error body.
    pub(crate) fn message_from(body: &[u8]) -> Option<String> {
        let parsed: ErrorResponse = serde_json::from_slice(body).ok()?;
        parsed.detail.or(parsed.title).or_else(|| {
            parsed
                .errors
                .into_iter()
                .find_map(|e| e.message.or(e.detail))
        })
    }
}
