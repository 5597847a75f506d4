// Error taxonomy surfaced to tool callers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error kind carried in every failed tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnknownTool,
    InvalidArguments,
    AuthError,
    RateLimited,
    NotFound,
    TransientError,
    ClientError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownTool => "UnknownTool",
            ErrorKind::InvalidArguments => "InvalidArguments",
            ErrorKind::AuthError => "AuthError",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::TransientError => "TransientError",
            ErrorKind::ClientError => "ClientError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single argument that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub problem: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Failure of a single tool invocation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    /// No tool is registered under this name.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// One or more arguments failed schema validation.
    #[error("Invalid arguments: {}", join_fields(.0))]
    InvalidArguments(Vec<FieldError>),

    /// Credentials are missing or were rejected upstream.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The call would be (or was) rejected by the upstream rate limiter.
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    /// The addressed resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failure, timeout or upstream 5xx.
    #[error("Transient upstream failure: {0}")]
    Transient(String),

    /// The upstream rejected the request for any other reason.
    #[error("Upstream rejected the request: {0}")]
    Client(String),
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ToolError {
    pub fn invalid(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self::InvalidArguments(vec![FieldError::new(field, problem)])
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::InvalidArguments(_) => ErrorKind::InvalidArguments,
            Self::Auth(_) => ErrorKind::AuthError,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Transient(_) => ErrorKind::TransientError,
            Self::Client(_) => ErrorKind::ClientError,
        }
    }

    /// Only transient failures are worth repeating within the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Names of the offending fields for `InvalidArguments`.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::InvalidArguments(fields) => fields.iter().map(|f| f.field.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ToolError::Transient("timeout".into()).is_retryable());
        assert!(!ToolError::RateLimited { retry_after: 10 }.is_retryable());
        assert!(!ToolError::NotFound("tweet 1".into()).is_retryable());
        assert!(!ToolError::Auth("401".into()).is_retryable());
        assert!(!ToolError::Client("400".into()).is_retryable());
    }

    #[test]
    fn test_invalid_arguments_message_names_fields() {
        let err = ToolError::InvalidArguments(vec![
            FieldError::new("text", "is required"),
            FieldError::new("count", "must be between 1 and 100"),
        ]);

        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
        assert_eq!(err.fields(), vec!["text", "count"]);
        assert_eq!(
            err.to_string(),
            "Invalid arguments: text: is required; count: must be between 1 and 100"
        );
    }

    #[test]
    fn test_kind_serializes_as_name() {
        let json = serde_json::to_value(ErrorKind::RateLimited).unwrap();
        assert_eq!(json, serde_json::json!("RateLimited"));
        assert_eq!(ToolError::RateLimited { retry_after: 900 }.retry_after(), Some(900));
    }
}
