use serde_json::json;

use crate::ipc::error::{ok, ApiError};
use crate::ipc::helpers::{
    conn_of, optional_i64, optional_str, required_str, respond, session_of, to_json,
};
use crate::ipc::types::{AppState, Request, Session};
use crate::store::users::{self, NewUser, Role, UserRecord};

fn session_from(user: &UserRecord) -> Session {
    Session {
        uid: user.uid.clone(),
        name: user.name.clone(),
        role: user.role,
        branch: user.branch.clone(),
        semester: user.semester,
    }
}

fn register(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let uid = required_str(params, "uid")?;
    let name = required_str(params, "name")?;
    let email = required_str(params, "email")?;
    let password = required_str(params, "password")?;
    let role_raw = required_str(params, "role")?;
    let requested_role = match Role::parse(&role_raw) {
        Some(role @ (Role::Student | Role::Faculty)) => role,
        _ => {
            return Err(ApiError::bad_params(
                "role must be \"student\" or \"faculty\"",
            ))
        }
    };

    let branch = optional_str(params, "branch");
    let semester = optional_i64(params, "semester");
    if requested_role == Role::Student {
        if branch.is_none() {
            return Err(ApiError::bad_params("students must register with a branch"));
        }
        if semester.is_none() {
            return Err(ApiError::bad_params(
                "students must register with a semester",
            ));
        }
    }

    if users::get_opt(conn, &uid)?.is_some() {
        return Err(ApiError::new("conflict", format!("uid {uid} is already registered")));
    }
    if users::email_taken(conn, &email, None)? {
        return Err(ApiError::new("conflict", format!("email {email} is already registered")));
    }

    let user = users::insert_pending(
        conn,
        &NewUser {
            uid,
            name,
            email,
            password,
            requested_role,
            branch,
            semester,
        },
    )?;
    log::info!("registration pending approval: {}", user.uid);
    Ok(json!({ "user": to_json(&user)? }))
}

fn handle_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let looked_up: Result<UserRecord, ApiError> = (|| {
        let conn = conn_of(state)?;
        let uid = required_str(&req.params, "uid")?;
        let password = required_str(&req.params, "password")?;
        // Mock credential check: plain equality, same failure shape for
        // unknown uid and wrong password.
        let user = users::get_opt(conn, &uid)?
            .filter(|u| u.password == password)
            .ok_or_else(|| ApiError::new("invalid_credentials", "unknown uid or wrong password"))?;
        if user.role == Role::Pending {
            return Err(ApiError::new(
                "approval_pending",
                "account is awaiting admin approval",
            ));
        }
        Ok(user)
    })();

    match looked_up {
        Ok(user) => {
            state.session = Some(session_from(&user));
            log::info!("signed in: {} ({})", user.uid, user.role.as_str());
            respond(&req.id, to_json(&user).map(|u| json!({ "user": u })))
        }
        Err(e) => e.response(&req.id),
    }
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> serde_json::Value {
    let was = state.session.take();
    if let Some(session) = &was {
        log::info!("signed out: {}", session.uid);
    }
    ok(&req.id, json!({ "signedOut": was.is_some() }))
}

fn me(state: &AppState) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let user = users::get(conn, &session.uid)?;
    Ok(json!({ "user": to_json(&user)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.register" => Some(respond(&req.id, register(state, &req.params))),
        "auth.signIn" => Some(handle_sign_in(state, req)),
        "auth.signOut" => Some(handle_sign_out(state, req)),
        "auth.me" => Some(respond(&req.id, me(state))),
        _ => None,
    }
}
