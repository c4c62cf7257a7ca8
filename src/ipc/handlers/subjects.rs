use serde_json::json;

use crate::ipc::error::ApiError;
use crate::ipc::helpers::{
    conn_of, optional_i64, optional_str, required_i64, required_str, respond, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::store::subjects::{self, SubjectPatch};
use crate::store::users::{self, Role};

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let branch = optional_str(params, "branch");
    let semester = optional_i64(params, "semester");
    let listed = subjects::list(conn, branch.as_deref(), semester)?;
    Ok(json!({ "subjects": to_json(&listed)? }))
}

fn create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let code = required_str(params, "code")?;
    let name = required_str(params, "name")?;
    let branch = required_str(params, "branch")?;
    let semester = required_i64(params, "semester")?;
    let faculty_uid = optional_str(params, "facultyUid");

    if let Some(uid) = faculty_uid.as_deref() {
        let faculty = users::get(conn, uid)?;
        if faculty.role != Role::Faculty {
            return Err(ApiError::bad_params(format!("{uid} is not a faculty account")));
        }
    }
    if subjects::code_taken(conn, &code, &branch, semester, None)? {
        return Err(ApiError::new(
            "conflict",
            format!("subject {code} already exists for {branch} semester {semester}"),
        ));
    }

    let subject = subjects::create(
        conn,
        &code,
        &name,
        &branch,
        semester,
        faculty_uid.as_deref(),
    )?;
    Ok(json!({ "subject": to_json(&subject)? }))
}

fn update(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let id = required_str(params, "id")?;
    let current = subjects::get(conn, &id)?;
    if let Some(code) = optional_str(params, "code") {
        if subjects::code_taken(conn, &code, &current.branch, current.semester, Some(&id))? {
            return Err(ApiError::new(
                "conflict",
                format!(
                    "subject {code} already exists for {} semester {}",
                    current.branch, current.semester
                ),
            ));
        }
    }
    let patch = SubjectPatch {
        code: optional_str(params, "code"),
        name: optional_str(params, "name"),
    };
    let subject = subjects::update(conn, &id, &patch)?;
    Ok(json!({ "subject": to_json(&subject)? }))
}

fn assign_faculty(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let id = required_str(params, "subjectId")?;
    let faculty_uid = optional_str(params, "facultyUid");
    if let Some(uid) = faculty_uid.as_deref() {
        let faculty = users::get(conn, uid)?;
        if faculty.role != Role::Faculty {
            return Err(ApiError::bad_params(format!("{uid} is not a faculty account")));
        }
    }
    let subject = subjects::assign_faculty(conn, &id, faculty_uid.as_deref())?;
    Ok(json!({ "subject": to_json(&subject)? }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let id = required_str(params, "id")?;
    subjects::delete(conn, &id)?;
    Ok(json!({ "deleted": id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(respond(&req.id, list(state, &req.params))),
        "subjects.create" => Some(respond(&req.id, create(state, &req.params))),
        "subjects.update" => Some(respond(&req.id, update(state, &req.params))),
        "subjects.assignFaculty" => Some(respond(&req.id, assign_faculty(state, &req.params))),
        "subjects.delete" => Some(respond(&req.id, delete(state, &req.params))),
        _ => None,
    }
}
