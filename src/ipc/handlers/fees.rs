use std::collections::BTreeMap;

use serde_json::json;

use crate::calc;
use crate::ipc::error::ApiError;
use crate::ipc::helpers::{
    conn_of, expected_version, optional_str, required_date, required_f64, required_str, respond,
    session_of, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::store::fees::{self, FeeStatus, FeeUpsert};
use crate::store::users::{self, Role};

fn upsert(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let student_uid = required_str(params, "studentUid")?;
    let title = required_str(params, "title")?;
    let amount = required_f64(params, "amount")?;
    if amount <= 0.0 {
        return Err(ApiError::bad_params("amount must be positive"));
    }
    let due_date = required_date(params, "dueDate")?;
    let student = users::get(conn, &student_uid)?;
    if student.role != Role::Student {
        return Err(ApiError::bad_params(format!(
            "{student_uid} is not a student account"
        )));
    }

    let record = fees::upsert(
        conn,
        &FeeUpsert {
            id: optional_str(params, "id"),
            student_uid,
            title,
            amount,
            due_date,
            expected_version: expected_version(params),
        },
    )?;
    Ok(json!({ "fee": to_json(&record)? }))
}

fn mark_paid(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let id = required_str(params, "id")?;
    let record = fees::mark_paid(conn, &id)?;
    Ok(json!({ "fee": to_json(&record)? }))
}

fn list_for_student(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let target = optional_str(params, "studentUid").unwrap_or_else(|| session.uid.clone());
    if session.role == Role::Student && target != session.uid {
        return Err(ApiError::forbidden("students may only read their own fees"));
    }

    let records = fees::list_for_student(conn, &target)?;
    let total_due = calc::total_due(records.iter().map(|r| (r.status, r.amount)));
    Ok(json!({
        "studentUid": target,
        "fees": to_json(&records)?,
        "totalDue": total_due,
    }))
}

fn branch_summary(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let branch = optional_str(params, "branch");
    let rows = fees::rows_for_branch(conn, branch.as_deref())?;

    // Keyed by uid; BTreeMap keeps the output order stable.
    let mut per_student: BTreeMap<String, (String, Vec<(FeeStatus, f64)>)> = BTreeMap::new();
    for row in rows {
        per_student
            .entry(row.student_uid.clone())
            .or_insert_with(|| (row.student_name.clone(), Vec::new()))
            .1
            .push((row.status, row.amount));
    }

    let mut students = Vec::with_capacity(per_student.len());
    let mut billed_total = 0.0f64;
    let mut due_total = 0.0f64;
    for (uid, (name, items)) in per_student {
        let billed: f64 = items.iter().map(|(_, amount)| amount).sum();
        let due = calc::total_due(items);
        billed_total += billed;
        due_total += due;
        students.push(json!({
            "studentUid": uid,
            "name": name,
            "billed": billed,
            "collected": billed - due,
            "due": due,
        }));
    }

    Ok(json!({
        "branch": branch,
        "students": students,
        "totals": {
            "billed": billed_total,
            "collected": billed_total - due_total,
            "due": due_total,
        },
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fees.upsert" => Some(respond(&req.id, upsert(state, &req.params))),
        "fees.markPaid" => Some(respond(&req.id, mark_paid(state, &req.params))),
        "fees.listForStudent" => Some(respond(&req.id, list_for_student(state, &req.params))),
        "fees.branchSummary" => Some(respond(&req.id, branch_summary(state, &req.params))),
        _ => None,
    }
}
