use serde_json::json;

use crate::ipc::error::ApiError;
use crate::ipc::helpers::{
    conn_of, optional_str, required_i64, required_str, respond, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::store::subjects;
use crate::store::timetable;

const DAYS_PER_WEEK: i64 = 6;
const PERIODS_PER_DAY: i64 = 8;

fn set_slot(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let branch = required_str(params, "branch")?;
    let semester = required_i64(params, "semester")?;
    let day = required_i64(params, "day")?;
    let period = required_i64(params, "period")?;
    if !(1..=DAYS_PER_WEEK).contains(&day) {
        return Err(ApiError::bad_params(format!(
            "day must be between 1 and {DAYS_PER_WEEK}"
        )));
    }
    if !(1..=PERIODS_PER_DAY).contains(&period) {
        return Err(ApiError::bad_params(format!(
            "period must be between 1 and {PERIODS_PER_DAY}"
        )));
    }

    let subject_id = optional_str(params, "subjectId");
    if let Some(id) = subject_id.as_deref() {
        subjects::get(conn, id)?;
    }
    timetable::set_slot(
        conn,
        &branch,
        semester,
        day,
        period,
        subject_id.as_deref(),
    )?;
    Ok(json!({ "ok": true }))
}

fn get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let branch = required_str(params, "branch")?;
    let semester = required_i64(params, "semester")?;
    let slots = timetable::grid(conn, &branch, semester)?;
    Ok(json!({
        "branch": branch,
        "semester": semester,
        "daysPerWeek": DAYS_PER_WEEK,
        "periodsPerDay": PERIODS_PER_DAY,
        "slots": to_json(&slots)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.setSlot" => Some(respond(&req.id, set_slot(state, &req.params))),
        "timetable.get" => Some(respond(&req.id, get(state, &req.params))),
        _ => None,
    }
}
