use serde_json::json;

use crate::ipc::error::ApiError;
use crate::ipc::helpers::{
    conn_of, expected_version, optional_date, optional_str, required_date, required_i64,
    required_str, respond, session_of, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::store::assignments::{self, AssignmentPatch};
use crate::store::materials;
use crate::store::subjects;
use crate::store::users::Role;

fn create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let subject_id = required_str(params, "subjectId")?;
    let title = required_str(params, "title")?;
    let description = optional_str(params, "description").unwrap_or_default();
    let due_date = required_date(params, "dueDate")?;
    subjects::get(conn, &subject_id)?;

    let assignment = assignments::create(
        conn,
        &subject_id,
        &title,
        &description,
        &due_date,
        &session.uid,
    )?;
    Ok(json!({ "assignment": to_json(&assignment)? }))
}

fn update(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let id = required_str(params, "id")?;
    let current = assignments::get(conn, &id)?;
    if session.role != Role::Admin && current.faculty_uid != session.uid {
        return Err(ApiError::forbidden(
            "only the assigning faculty or an admin may edit an assignment",
        ));
    }
    let patch = AssignmentPatch {
        title: optional_str(params, "title"),
        description: optional_str(params, "description"),
        due_date: optional_date(params, "dueDate")?,
        expected_version: expected_version(params),
    };
    let assignment = assignments::update(conn, &id, &patch)?;
    Ok(json!({ "assignment": to_json(&assignment)? }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let id = required_str(params, "id")?;
    let current = assignments::get(conn, &id)?;
    if session.role != Role::Admin && current.faculty_uid != session.uid {
        return Err(ApiError::forbidden(
            "only the assigning faculty or an admin may delete an assignment",
        ));
    }
    assignments::delete(conn, &id)?;
    Ok(json!({ "deleted": id }))
}

/// Resolves the listing scope: an explicit subject beats an explicit
/// branch+semester, and a student with neither falls back to their own
/// branch+semester.
fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    if let Some(subject_id) = optional_str(params, "subjectId") {
        subjects::get(conn, &subject_id)?;
        let listed = assignments::list_for_subject(conn, &subject_id)?;
        return Ok(json!({ "assignments": to_json(&listed)? }));
    }

    let (branch, semester) = scope_of(session.role, &session.branch, session.semester, params)?;
    let listed = assignments::list_for_branch_semester(conn, &branch, semester)?;
    Ok(json!({ "assignments": to_json(&listed)? }))
}

fn scope_of(
    role: Role,
    session_branch: &Option<String>,
    session_semester: Option<i64>,
    params: &serde_json::Value,
) -> Result<(String, i64), ApiError> {
    if role == Role::Student {
        let branch = session_branch
            .clone()
            .ok_or_else(|| ApiError::bad_params("student account has no branch"))?;
        let semester = session_semester
            .ok_or_else(|| ApiError::bad_params("student account has no semester"))?;
        return Ok((branch, semester));
    }
    Ok((
        required_str(params, "branch")?,
        required_i64(params, "semester")?,
    ))
}

fn material_upload(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let subject_id = required_str(params, "subjectId")?;
    let title = required_str(params, "title")?;
    let url = required_str(params, "url")?;
    let description = optional_str(params, "description").unwrap_or_default();
    subjects::get(conn, &subject_id)?;

    let material = materials::upload(conn, &subject_id, &title, &url, &description, &session.uid)?;
    Ok(json!({ "material": to_json(&material)? }))
}

fn material_list(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    if let Some(subject_id) = optional_str(params, "subjectId") {
        subjects::get(conn, &subject_id)?;
        let listed = materials::list_for_subject(conn, &subject_id)?;
        return Ok(json!({ "materials": to_json(&listed)? }));
    }
    let (branch, semester) = scope_of(session.role, &session.branch, session.semester, params)?;
    let listed = materials::list_for_branch_semester(conn, &branch, semester)?;
    Ok(json!({ "materials": to_json(&listed)? }))
}

fn material_delete(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let id = required_str(params, "id")?;
    let current = materials::get(conn, &id)?;
    if session.role != Role::Admin && current.uploaded_by != session.uid {
        return Err(ApiError::forbidden(
            "only the uploader or an admin may delete a material",
        ));
    }
    materials::delete(conn, &id)?;
    Ok(json!({ "deleted": id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.create" => Some(respond(&req.id, create(state, &req.params))),
        "assignments.update" => Some(respond(&req.id, update(state, &req.params))),
        "assignments.delete" => Some(respond(&req.id, delete(state, &req.params))),
        "assignments.list" => Some(respond(&req.id, list(state, &req.params))),
        "materials.upload" => Some(respond(&req.id, material_upload(state, &req.params))),
        "materials.list" => Some(respond(&req.id, material_list(state, &req.params))),
        "materials.delete" => Some(respond(&req.id, material_delete(state, &req.params))),
        _ => None,
    }
}
