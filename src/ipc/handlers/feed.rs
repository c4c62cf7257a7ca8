use serde_json::json;

use crate::ipc::error::ApiError;
use crate::ipc::helpers::{
    conn_of, optional_i64, required_str, respond, session_of, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::store::feed;
use crate::store::users::Role;

const DEFAULT_FEED_LIMIT: i64 = 50;
const MAX_FEED_LIMIT: i64 = 200;

fn post(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let content = required_str(params, "content")?;
    let view = feed::create(conn, &session.uid, &content)?;
    Ok(json!({ "post": to_json(&view)? }))
}

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let limit = optional_i64(params, "limit")
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .clamp(1, MAX_FEED_LIMIT);
    let posts = feed::list(conn, &session.uid, limit)?;
    Ok(json!({ "posts": to_json(&posts)? }))
}

fn like(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let id = required_str(params, "postId")?;
    feed::like(conn, &id, &session.uid)?;
    let view = feed::get_view(conn, &id, &session.uid)?;
    Ok(json!({ "post": to_json(&view)? }))
}

fn unlike(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let id = required_str(params, "postId")?;
    feed::unlike(conn, &id, &session.uid)?;
    let view = feed::get_view(conn, &id, &session.uid)?;
    Ok(json!({ "post": to_json(&view)? }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let id = required_str(params, "postId")?;
    let author = feed::author_of(conn, &id)?;
    if session.role != Role::Admin && author != session.uid {
        return Err(ApiError::forbidden(
            "only the author or an admin may delete a post",
        ));
    }
    feed::delete(conn, &id)?;
    Ok(json!({ "deleted": id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "feed.post" => Some(respond(&req.id, post(state, &req.params))),
        "feed.list" => Some(respond(&req.id, list(state, &req.params))),
        "feed.like" => Some(respond(&req.id, like(state, &req.params))),
        "feed.unlike" => Some(respond(&req.id, unlike(state, &req.params))),
        "feed.delete" => Some(respond(&req.id, delete(state, &req.params))),
        _ => None,
    }
}
