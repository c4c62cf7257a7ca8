use serde_json::json;

use crate::store::StoreError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Request-level failure with a stable code; the router and every handler
/// funnel through this one shape.
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("forbidden", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ApiError::new("not_found", format!("{what} not found")),
            StoreError::VersionConflict { expected, actual } => ApiError {
                code: "version_conflict",
                message: "record was modified since it was read".to_string(),
                details: Some(json!({
                    "expectedVersion": expected,
                    "actualVersion": actual,
                })),
            },
            StoreError::Invalid(message) => ApiError::new("conflict", message),
            StoreError::Db(err) => ApiError::new("db_query_failed", err.to_string()),
        }
    }
}
