// Boundary to the upstream API

use crate::error::ToolError;
use crate::operation::Operation;
use crate::ratelimit::{Observation, RateLimitHeaders};
use async_trait::async_trait;
use serde_json::Value;

/// Successful upstream response
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    /// Raw (unshaped) response data
    pub payload: Value,
    pub rate_limit: RateLimitHeaders,
}

impl UpstreamReply {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            rate_limit: RateLimitHeaders::default(),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitHeaders) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

/// Classified upstream failure, plus whatever rate-limit headers came with it
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{error}")]
pub struct UpstreamError {
    pub error: ToolError,
    pub rate_limit: RateLimitHeaders,
}

impl UpstreamError {
    pub fn new(error: ToolError) -> Self {
        Self {
            error,
            rate_limit: RateLimitHeaders::default(),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitHeaders) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// What the governor should learn from this failure.
    pub fn observation(&self) -> Observation {
        match &self.error {
            ToolError::RateLimited { retry_after } => Observation::RateLimited {
                retry_after: Some(*retry_after),
                headers: self.rate_limit,
            },
            _ => Observation::Headers(self.rate_limit),
        }
    }
}

impl From<ToolError> for UpstreamError {
    fn from(error: ToolError) -> Self {
        Self::new(error)
    }
}

/// Executes operations against the upstream API.
///
/// Implementations perform exactly one logical operation per call (compound
/// operations may issue several requests) and never retry on their own.
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    async fn execute(&self, operation: &Operation) -> Result<UpstreamReply, UpstreamError>;
}
