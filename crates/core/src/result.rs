// Uniform result returned for every tool invocation

use crate::error::{ErrorKind, FieldError, ToolError};
use crate::types::Provenance;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl From<&ToolError> for ErrorBody {
    fn from(error: &ToolError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            retry_after: error.retry_after(),
            fields: match error {
                ToolError::InvalidArguments(fields) => fields.clone(),
                _ => Vec::new(),
            },
        }
    }
}

/// Outcome of one tool invocation, always well formed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ToolResult {
    pub fn ok(payload: Value, provenance: Provenance) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            provenance: Some(provenance),
            warning: None,
            error: None,
        }
    }

    pub fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warning = warning;
        self
    }

    pub fn failure(error: &ToolError) -> Self {
        Self {
            success: false,
            payload: None,
            provenance: None,
            warning: None,
            error: Some(error.into()),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<Result<ToolResult, ToolError>> for ToolResult {
    fn from(result: Result<ToolResult, ToolError>) -> Self {
        result.unwrap_or_else(|e| ToolResult::failure(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let result = ToolResult::ok(json!({"id": "1"}), Provenance::Derived)
            .with_warning(Some("computed".into()));
        assert_eq!(
            result.to_json(),
            json!({
                "success": true,
                "payload": {"id": "1"},
                "provenance": "derived",
                "warning": "computed"
            })
        );
    }

    #[test]
    fn test_rate_limited_shape() {
        let result = ToolResult::failure(&ToolError::RateLimited { retry_after: 900 });
        let json = result.to_json();
        assert_eq!(json["success"], json!(false));
        assert_eq!(json["error"]["kind"], json!("RateLimited"));
        assert_eq!(json["error"]["retryAfter"], json!(900));
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn test_invalid_arguments_lists_fields() {
        let err = ToolError::invalid("count", "must be an integer");
        let json = ToolResult::failure(&err).to_json();
        assert_eq!(json["error"]["fields"][0]["field"], json!("count"));
        assert!(json["error"].get("retryAfter").is_none());
    }
}
