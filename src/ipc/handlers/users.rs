use serde_json::json;

use crate::ipc::error::ApiError;
use crate::ipc::helpers::{
    conn_of, optional_i64, optional_str, required_str, respond, session_of, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::store::users::{self, Role, UserPatch};

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let role = match optional_str(params, "role") {
        Some(raw) => Some(
            Role::parse(&raw).ok_or_else(|| ApiError::bad_params(format!("unknown role: {raw}")))?,
        ),
        None => None,
    };
    // Faculty get the student roster only; the full directory is admin's.
    let role = if session.role == Role::Faculty {
        Some(Role::Student)
    } else {
        role
    };
    let branch = optional_str(params, "branch");
    let listed = users::list(conn, role, branch.as_deref())?;
    Ok(json!({ "users": to_json(&listed)? }))
}

fn approve(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let uid = required_str(params, "uid")?;
    let user = users::approve(conn, &uid)?;
    log::info!("approved {} as {}", user.uid, user.role.as_str());
    Ok(json!({ "user": to_json(&user)? }))
}

fn reject(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let uid = required_str(params, "uid")?;
    users::reject(conn, &uid)?;
    log::info!("rejected registration {uid}");
    Ok(json!({ "rejected": uid }))
}

fn update(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let target = optional_str(params, "uid").unwrap_or_else(|| session.uid.clone());
    if session.role != Role::Admin && target != session.uid {
        return Err(ApiError::forbidden("only an admin may update other accounts"));
    }

    let branch = optional_str(params, "branch");
    let semester = optional_i64(params, "semester");
    if session.role != Role::Admin && (branch.is_some() || semester.is_some()) {
        return Err(ApiError::forbidden(
            "only an admin may change branch or semester",
        ));
    }

    if let Some(email) = optional_str(params, "email") {
        if users::email_taken(conn, &email, Some(&target))? {
            return Err(ApiError::new(
                "conflict",
                format!("email {email} is already registered"),
            ));
        }
    }

    let patch = UserPatch {
        name: optional_str(params, "name"),
        email: optional_str(params, "email"),
        password: optional_str(params, "password"),
        branch,
        semester,
        expected_version: optional_i64(params, "expectedVersion"),
    };
    let user = users::update(conn, &target, &patch)?;
    Ok(json!({ "user": to_json(&user)? }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let uid = required_str(params, "uid")?;
    if uid == session.uid {
        return Err(ApiError::new(
            "conflict",
            "cannot delete the signed-in account",
        ));
    }
    users::delete(conn, &uid)?;
    log::info!("deleted account {uid}");
    Ok(json!({ "deleted": uid }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.list" => Some(respond(&req.id, list(state, &req.params))),
        "users.approve" => Some(respond(&req.id, approve(state, &req.params))),
        "users.reject" => Some(respond(&req.id, reject(state, &req.params))),
        "users.update" => Some(respond(&req.id, update(state, &req.params))),
        "users.delete" => Some(respond(&req.id, delete(state, &req.params))),
        _ => None,
    }
}
