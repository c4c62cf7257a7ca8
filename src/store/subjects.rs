use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use serde::Serialize;

use super::{new_id, StoreError, StoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub id: String,
    pub code: String,
    pub name: String,
    pub branch: String,
    pub semester: i64,
    pub faculty_uid: Option<String>,
}

const SUBJECT_SELECT: &str =
    "SELECT id, code, name, branch, semester, faculty_uid FROM subjects";

fn row_to_subject(r: &rusqlite::Row<'_>) -> rusqlite::Result<SubjectRecord> {
    Ok(SubjectRecord {
        id: r.get(0)?,
        code: r.get(1)?,
        name: r.get(2)?,
        branch: r.get(3)?,
        semester: r.get(4)?,
        faculty_uid: r.get(5)?,
    })
}

pub fn get_opt(conn: &Connection, id: &str) -> StoreResult<Option<SubjectRecord>> {
    let sql = format!("{SUBJECT_SELECT} WHERE id = ?");
    Ok(conn.query_row(&sql, [id], row_to_subject).optional()?)
}

pub fn get(conn: &Connection, id: &str) -> StoreResult<SubjectRecord> {
    get_opt(conn, id)?.ok_or(StoreError::NotFound("subject"))
}

pub fn code_taken(
    conn: &Connection,
    code: &str,
    branch: &str,
    semester: i64,
    exclude_id: Option<&str>,
) -> StoreResult<bool> {
    let owner: Option<String> = conn
        .query_row(
            "SELECT id FROM subjects WHERE code = ? AND branch = ? AND semester = ?",
            params![code, branch, semester],
            |r| r.get(0),
        )
        .optional()?;
    Ok(match (owner, exclude_id) {
        (Some(owner), Some(exclude)) => owner != exclude,
        (Some(_), None) => true,
        (None, _) => false,
    })
}

pub fn create(
    conn: &Connection,
    code: &str,
    name: &str,
    branch: &str,
    semester: i64,
    faculty_uid: Option<&str>,
) -> StoreResult<SubjectRecord> {
    let id = new_id();
    conn.execute(
        "INSERT INTO subjects(id, code, name, branch, semester, faculty_uid)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![id, code, name, branch, semester, faculty_uid],
    )?;
    get(conn, &id)
}

#[derive(Default)]
pub struct SubjectPatch {
    pub code: Option<String>,
    pub name: Option<String>,
}

pub fn update(conn: &Connection, id: &str, patch: &SubjectPatch) -> StoreResult<SubjectRecord> {
    let current = get(conn, id)?;
    let code = patch.code.clone().unwrap_or(current.code);
    let name = patch.name.clone().unwrap_or(current.name);
    conn.execute(
        "UPDATE subjects SET code = ?, name = ? WHERE id = ?",
        params![code, name, id],
    )?;
    get(conn, id)
}

pub fn assign_faculty(
    conn: &Connection,
    id: &str,
    faculty_uid: Option<&str>,
) -> StoreResult<SubjectRecord> {
    get(conn, id)?;
    conn.execute(
        "UPDATE subjects SET faculty_uid = ? WHERE id = ?",
        params![faculty_uid, id],
    )?;
    get(conn, id)
}

pub fn list(
    conn: &Connection,
    branch: Option<&str>,
    semester: Option<i64>,
) -> StoreResult<Vec<SubjectRecord>> {
    let mut sql = String::from(SUBJECT_SELECT);
    let mut clauses: Vec<&str> = Vec::new();
    let mut args: Vec<Value> = Vec::new();
    if let Some(branch) = branch {
        clauses.push("branch = ?");
        args.push(Value::Text(branch.to_string()));
    }
    if let Some(semester) = semester {
        clauses.push("semester = ?");
        args.push(Value::Integer(semester));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY branch, semester, code");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args), row_to_subject)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Dropping a subject takes its dependents with it in one transaction:
/// timetable slots, materials, assignments, and attendance history all key
/// off the subject id.
pub fn delete(conn: &Connection, id: &str) -> StoreResult<()> {
    get(conn, id)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM timetable_slots WHERE subject_id = ?", [id])?;
    tx.execute("DELETE FROM study_materials WHERE subject_id = ?", [id])?;
    tx.execute("DELETE FROM assignments WHERE subject_id = ?", [id])?;
    tx.execute("DELETE FROM attendance_records WHERE subject_id = ?", [id])?;
    tx.execute("DELETE FROM subjects WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(())
}
