use serde_json::json;

use crate::calc;
use crate::ipc::error::ApiError;
use crate::ipc::helpers::{
    conn_of, optional_i64, optional_str, required_date, required_str, respond, session_of, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::store::attendance::{self, MarkEntry, Status};
use crate::store::subjects;
use crate::store::users::Role;

fn mark(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let subject_id = required_str(params, "subjectId")?;
    let date = required_date(params, "date")?;
    subjects::get(conn, &subject_id)?;

    let Some(entries_json) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err(ApiError::bad_params("missing entries"));
    };
    let mut entries: Vec<MarkEntry> = Vec::with_capacity(entries_json.len());
    for entry in entries_json {
        let student_uid = required_str(entry, "studentUid")?;
        let status_raw = required_str(entry, "status")?;
        let status = Status::parse(&status_raw)
            .ok_or_else(|| ApiError::bad_params(format!("unknown status: {status_raw}")))?;
        entries.push(MarkEntry {
            student_uid,
            status,
        });
    }

    let marked = attendance::mark_bulk(conn, &subject_id, &date, &session.uid, &entries)?;
    Ok(json!({ "marked": marked }))
}

fn student_summary(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let target = optional_str(params, "studentUid").unwrap_or_else(|| session.uid.clone());
    if session.role == Role::Student && target != session.uid {
        return Err(ApiError::forbidden(
            "students may only read their own attendance",
        ));
    }

    let summaries = calc::summarize_subjects(attendance::counts_for_student(conn, &target)?);
    let present: i64 = summaries.iter().map(|s| s.present).sum();
    let total: i64 = summaries.iter().map(|s| s.total).sum();
    Ok(json!({
        "studentUid": target,
        "subjects": to_json(&summaries)?,
        "overall": {
            "present": present,
            "total": total,
            "percentage": calc::attendance_percentage(present, total),
        },
    }))
}

fn branch_summary(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let branch = required_str(params, "branch")?;
    let semester = optional_i64(params, "semester");
    let counts = attendance::counts_for_branch(conn, &branch, semester)?;
    let students: Vec<serde_json::Value> = counts
        .iter()
        .map(|c| {
            json!({
                "studentUid": c.student_uid,
                "name": c.student_name,
                "present": c.present,
                "total": c.total,
                "percentage": calc::attendance_percentage(c.present, c.total),
            })
        })
        .collect();
    Ok(json!({
        "branch": branch,
        "semester": semester,
        "students": students,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(respond(&req.id, mark(state, &req.params))),
        "attendance.studentSummary" => Some(respond(&req.id, student_summary(state, &req.params))),
        "attendance.branchSummary" => Some(respond(&req.id, branch_summary(state, &req.params))),
        _ => None,
    }
}
