use serde_json::json;

use crate::db;
use crate::ipc::error::{err, ok, ApiError};
use crate::ipc::helpers::{conn_of, optional_i64, respond};
use crate::ipc::types::{AppState, Request};
use crate::logging;
use crate::notify;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "signedInUid": state.session.as_ref().map(|s| s.uid.clone()),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            // Best-effort: a workspace without logs is still a workspace.
            let _ = logging::init(&path);
            log::info!("workspace opened: {}", path.to_string_lossy());
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            state.session = None;
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn settings_get(state: &AppState) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let (threshold, window) = notify::tunables(conn);
    Ok(json!({
        "attendanceThreshold": threshold,
        "assignmentDueWindowDays": window,
    }))
}

fn settings_update(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    if let Some(threshold) = optional_i64(params, "attendanceThreshold") {
        if !(0..=100).contains(&threshold) {
            return Err(ApiError::bad_params(
                "attendanceThreshold must be between 0 and 100",
            ));
        }
        db::settings_set_json(conn, notify::SETTING_ATTENDANCE_THRESHOLD, &json!(threshold))
            .map_err(|e| ApiError::new("db_update_failed", e.to_string()))?;
    }
    if let Some(window) = optional_i64(params, "assignmentDueWindowDays") {
        if window < 0 {
            return Err(ApiError::bad_params(
                "assignmentDueWindowDays must not be negative",
            ));
        }
        db::settings_set_json(conn, notify::SETTING_DUE_WINDOW_DAYS, &json!(window))
            .map_err(|e| ApiError::new("db_update_failed", e.to_string()))?;
    }
    settings_get(state)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "settings.get" => Some(respond(&req.id, settings_get(state))),
        "settings.update" => Some(respond(&req.id, settings_update(state, &req.params))),
        _ => None,
    }
}
