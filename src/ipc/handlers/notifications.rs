use serde_json::json;

use crate::calc;
use crate::ipc::error::ApiError;
use crate::ipc::helpers::{
    conn_of, optional_bool, required_str, respond, session_of, to_json,
};
use crate::ipc::types::{AppState, Request, Session};
use crate::notify;
use crate::store::users::Role;
use crate::store::{assignments, attendance, fees, notifications, users};
use rusqlite::Connection;

/// Assembles the role-appropriate snapshot, runs the pure eligibility
/// pass, and persists whatever is new. Existing rows (and their read
/// flags) are never touched.
fn generate(state: &AppState) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;

    let snap = build_snapshot(conn, session)?;
    let drafts = notify::eligible_notifications(&session.uid, &snap);
    let generated = notifications::insert_new(conn, &drafts)?;
    if generated > 0 {
        log::info!("generated {generated} notifications for {}", session.uid);
    }
    let items = notifications::list_for_user(conn, &session.uid, false)?;
    Ok(json!({
        "generated": generated,
        "notifications": to_json(&items)?,
    }))
}

fn build_snapshot(conn: &Connection, session: &Session) -> Result<notify::Snapshot, ApiError> {
    let (attendance_threshold, due_window_days) = notify::tunables(conn);
    let mut snap = notify::Snapshot {
        today: chrono::Local::now().date_naive(),
        attendance_threshold,
        due_window_days,
        prefs: notifications::prefs_get(conn, &session.uid)?,
        fees: Vec::new(),
        attendance: Vec::new(),
        assignments: Vec::new(),
        pending_signups: Vec::new(),
    };
    match session.role {
        Role::Student => {
            snap.fees = fees::list_for_student(conn, &session.uid)?;
            snap.attendance =
                calc::summarize_subjects(attendance::counts_for_student(conn, &session.uid)?);
            if let (Some(branch), Some(semester)) = (session.branch.as_deref(), session.semester) {
                snap.assignments = assignments::list_for_branch_semester(conn, branch, semester)?
                    .into_iter()
                    .map(|a| notify::AssignmentDue {
                        id: a.id,
                        title: a.title,
                        due_date: a.due_date,
                    })
                    .collect();
            }
        }
        Role::Admin => {
            snap.pending_signups = users::list_pending(conn)?
                .into_iter()
                .map(|u| notify::PendingSignup {
                    uid: u.uid,
                    name: u.name,
                })
                .collect();
        }
        Role::Faculty | Role::Pending => {}
    }
    Ok(snap)
}

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let unread_only = optional_bool(params, "unreadOnly").unwrap_or(false);
    let items = notifications::list_for_user(conn, &session.uid, unread_only)?;
    let unread = items.iter().filter(|n| !n.is_read).count();
    Ok(json!({
        "notifications": to_json(&items)?,
        "unreadCount": unread,
    }))
}

fn mark_read(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let id = required_str(params, "id")?;
    notifications::mark_read(conn, &session.uid, &id)?;
    Ok(json!({ "ok": true }))
}

fn mark_all_read(state: &AppState) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let changed = notifications::mark_all_read(conn, &session.uid)?;
    Ok(json!({ "marked": changed }))
}

fn prefs_get(state: &AppState) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let prefs = notifications::prefs_get(conn, &session.uid)?;
    Ok(json!({ "preferences": to_json(&prefs)? }))
}

/// Partial update: only the flags present in the request change.
fn prefs_set(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let mut prefs = notifications::prefs_get(conn, &session.uid)?;
    if let Some(v) = optional_bool(params, "feeDue") {
        prefs.fee_due = v;
    }
    if let Some(v) = optional_bool(params, "lowAttendance") {
        prefs.low_attendance = v;
    }
    if let Some(v) = optional_bool(params, "assignmentDue") {
        prefs.assignment_due = v;
    }
    if let Some(v) = optional_bool(params, "approvalPending") {
        prefs.approval_pending = v;
    }
    let saved = notifications::prefs_set(conn, &session.uid, &prefs)?;
    Ok(json!({ "preferences": to_json(&saved)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "notifications.generate" => Some(respond(&req.id, generate(state))),
        "notifications.list" => Some(respond(&req.id, list(state, &req.params))),
        "notifications.markRead" => Some(respond(&req.id, mark_read(state, &req.params))),
        "notifications.markAllRead" => Some(respond(&req.id, mark_all_read(state))),
        "notifications.prefs.get" => Some(respond(&req.id, prefs_get(state))),
        "notifications.prefs.set" => Some(respond(&req.id, prefs_set(state, &req.params))),
        _ => None,
    }
}
