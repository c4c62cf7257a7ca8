use serde_json::json;

use crate::ipc::error::ApiError;
use crate::ipc::helpers::{conn_of, required_str, respond, session_of, to_json};
use crate::ipc::types::{AppState, Request};
use crate::store::reports;
use crate::store::users::Role;

fn submit(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let category = required_str(params, "category")?;
    let message = required_str(params, "message")?;
    let report = reports::submit(conn, &session.uid, &category, &message)?;
    Ok(json!({ "report": to_json(&report)? }))
}

fn list(state: &AppState) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let scope = if session.role == Role::Admin {
        None
    } else {
        Some(session.uid.as_str())
    };
    let listed = reports::list(conn, scope)?;
    Ok(json!({ "reports": to_json(&listed)? }))
}

fn resolve(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let id = required_str(params, "id")?;
    let report = reports::resolve(conn, &id)?;
    Ok(json!({ "report": to_json(&report)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.submit" => Some(respond(&req.id, submit(state, &req.params))),
        "reports.list" => Some(respond(&req.id, list(state))),
        "reports.resolve" => Some(respond(&req.id, resolve(state, &req.params))),
        _ => None,
    }
}
