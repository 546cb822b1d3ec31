use crate::audit::orchestrator::Auditor;
use crate::audit::request::{AuditInput, ValidationError};
use crate::error::{AuditError, ErrorCategory};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

/// `{ "action": ..., "data": {...} }` as sent by the admin UI
#[derive(Debug, Deserialize)]
pub struct BridgeRequest {
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_category: ErrorCategory,
}

impl ErrorResponse {
    fn json(error: impl Into<String>, error_category: ErrorCategory) -> Value {
        let response = Self {
            error: error.into(),
            error_category,
        };
        serde_json::to_value(response).unwrap_or_else(|_| Value::Null)
    }
}

impl From<&AuditError> for ErrorResponse {
    fn from(e: &AuditError) -> Self {
        Self {
            error: e.to_string(),
            error_category: e.category(),
        }
    }
}

/// Answer one raw JSON request. Always returns a JSON document; failures
/// carry only `error` and `error_category`.
pub async fn handle(auditor: &Auditor, raw: &str, cancel: Option<watch::Receiver<bool>>) -> Value {
    let request: BridgeRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(e) => {
            warn!("Malformed request: {}", e);
            return ErrorResponse::json(format!("Malformed request: {}", e), ErrorCategory::Validation);
        }
    };
    debug!("Bridge action: {}", request.action);

    match request.action.as_str() {
        "deep_audit" | "energy_audit" => deep_audit(auditor, request.data, cancel).await,
        other => ErrorResponse::json(format!("Unknown action: {}", other), ErrorCategory::Validation),
    }
}

async fn deep_audit(auditor: &Auditor, data: Value, cancel: Option<watch::Receiver<bool>>) -> Value {
    if !data.is_object() {
        let e = AuditError::from(ValidationError::Missing("data"));
        return serde_json::to_value(ErrorResponse::from(&e)).unwrap_or(Value::Null);
    }
    // Every field is a lenient form value, so only a non-object fails here
    let input: AuditInput = match serde_json::from_value(data) {
        Ok(input) => input,
        Err(e) => {
            warn!("Unreadable audit payload: {}", e);
            return ErrorResponse::json("Invalid request: unreadable payload", ErrorCategory::Validation);
        }
    };

    match auditor.run(&input, cancel).await {
        Ok(report) => serde_json::to_value(&report).unwrap_or_else(|e| {
            ErrorResponse::json(format!("Failed to encode result: {}", e), ErrorCategory::Internal)
        }),
        Err(e) => serde_json::to_value(ErrorResponse::from(&e)).unwrap_or(Value::Null),
    }
}
