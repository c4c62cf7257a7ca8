use serde_json::json;

use crate::ipc::error::ApiError;
use crate::ipc::helpers::{conn_of, optional_str, required_str, respond, session_of, to_json};
use crate::ipc::types::{AppState, Request};
use crate::store::clubs;

fn create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let name = required_str(params, "name")?;
    let description = optional_str(params, "description").unwrap_or_default();
    if clubs::name_taken(conn, &name)? {
        return Err(ApiError::new(
            "conflict",
            format!("a club named {name} already exists"),
        ));
    }
    let club = clubs::create(conn, &name, &description, &session.uid)?;
    Ok(json!({ "club": to_json(&club)? }))
}

fn list(state: &AppState) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let listed = clubs::list(conn, &session.uid)?;
    Ok(json!({ "clubs": to_json(&listed)? }))
}

fn join(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let id = required_str(params, "clubId")?;
    let club = clubs::join(conn, &id, &session.uid)?;
    Ok(json!({ "club": to_json(&club)? }))
}

fn leave(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let id = required_str(params, "clubId")?;
    let club = clubs::leave(conn, &id, &session.uid)?;
    Ok(json!({ "club": to_json(&club)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "clubs.create" => Some(respond(&req.id, create(state, &req.params))),
        "clubs.list" => Some(respond(&req.id, list(state))),
        "clubs.join" => Some(respond(&req.id, join(state, &req.params))),
        "clubs.leave" => Some(respond(&req.id, leave(state, &req.params))),
        _ => None,
    }
}
