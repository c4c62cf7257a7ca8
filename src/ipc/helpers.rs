use chrono::NaiveDate;
use rusqlite::Connection;

use crate::ipc::error::ApiError;
use crate::ipc::types::{AppState, Session};

pub fn conn_of(state: &AppState) -> Result<&Connection, ApiError> {
    state
        .db
        .as_ref()
        .ok_or_else(|| ApiError::new("no_workspace", "select a workspace first"))
}

pub fn session_of(state: &AppState) -> Result<&Session, ApiError> {
    state
        .session
        .as_ref()
        .ok_or_else(|| ApiError::new("not_signed_in", "sign in first"))
}

pub fn respond(id: &str, out: Result<serde_json::Value, ApiError>) -> serde_json::Value {
    match out {
        Ok(result) => super::error::ok(id, result),
        Err(e) => e.response(id),
    }
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, ApiError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_params(format!("missing {key}")))
}

/// Absent, null, or empty string all read as `None`.
pub fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn required_i64(params: &serde_json::Value, key: &str) -> Result<i64, ApiError> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ApiError::bad_params(format!("missing {key}")))
}

pub fn optional_i64(params: &serde_json::Value, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.as_i64())
}

pub fn required_f64(params: &serde_json::Value, key: &str) -> Result<f64, ApiError> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ApiError::bad_params(format!("missing {key}")))
}

pub fn optional_bool(params: &serde_json::Value, key: &str) -> Option<bool> {
    params.get(key).and_then(|v| v.as_bool())
}

pub fn expected_version(params: &serde_json::Value) -> Option<i64> {
    optional_i64(params, "expectedVersion")
}

/// Calendar dates ride the wire as `YYYY-MM-DD`.
pub fn required_date(params: &serde_json::Value, key: &str) -> Result<String, ApiError> {
    let raw = required_str(params, key)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_params(format!("{key} must be YYYY-MM-DD")))?;
    Ok(raw)
}

pub fn optional_date(params: &serde_json::Value, key: &str) -> Result<Option<String>, ApiError> {
    match optional_str(params, key) {
        Some(raw) => {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| ApiError::bad_params(format!("{key} must be YYYY-MM-DD")))?;
            Ok(Some(raw))
        }
        None => Ok(None),
    }
}

pub fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::new("encode_failed", e.to_string()))
}
