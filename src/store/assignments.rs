use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::{check_version, new_id, now_rfc3339, StoreError, StoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    pub id: String,
    pub subject_id: String,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub faculty_uid: String,
    pub version: i64,
    pub created_at: String,
}

const ASSIGNMENT_SELECT: &str = "SELECT
    id, subject_id, title, description, due_date, faculty_uid, version, created_at
FROM assignments";

fn row_to_assignment(r: &rusqlite::Row<'_>) -> rusqlite::Result<AssignmentRecord> {
    Ok(AssignmentRecord {
        id: r.get(0)?,
        subject_id: r.get(1)?,
        title: r.get(2)?,
        description: r.get(3)?,
        due_date: r.get(4)?,
        faculty_uid: r.get(5)?,
        version: r.get(6)?,
        created_at: r.get(7)?,
    })
}

pub fn get_opt(conn: &Connection, id: &str) -> StoreResult<Option<AssignmentRecord>> {
    let sql = format!("{ASSIGNMENT_SELECT} WHERE id = ?");
    Ok(conn.query_row(&sql, [id], row_to_assignment).optional()?)
}

pub fn get(conn: &Connection, id: &str) -> StoreResult<AssignmentRecord> {
    get_opt(conn, id)?.ok_or(StoreError::NotFound("assignment"))
}

pub fn create(
    conn: &Connection,
    subject_id: &str,
    title: &str,
    description: &str,
    due_date: &str,
    faculty_uid: &str,
) -> StoreResult<AssignmentRecord> {
    let id = new_id();
    conn.execute(
        "INSERT INTO assignments(id, subject_id, title, description, due_date, faculty_uid, version, created_at)
         VALUES(?, ?, ?, ?, ?, ?, 1, ?)",
        params![id, subject_id, title, description, due_date, faculty_uid, now_rfc3339()],
    )?;
    get(conn, &id)
}

#[derive(Default)]
pub struct AssignmentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub expected_version: Option<i64>,
}

pub fn update(
    conn: &Connection,
    id: &str,
    patch: &AssignmentPatch,
) -> StoreResult<AssignmentRecord> {
    let current = get(conn, id)?;
    check_version(patch.expected_version, current.version)?;
    let title = patch.title.clone().unwrap_or(current.title);
    let description = patch.description.clone().unwrap_or(current.description);
    let due_date = patch.due_date.clone().unwrap_or(current.due_date);
    conn.execute(
        "UPDATE assignments SET title = ?, description = ?, due_date = ?, version = version + 1
         WHERE id = ?",
        params![title, description, due_date, id],
    )?;
    get(conn, id)
}

pub fn delete(conn: &Connection, id: &str) -> StoreResult<()> {
    get(conn, id)?;
    conn.execute("DELETE FROM assignments WHERE id = ?", [id])?;
    Ok(())
}

pub fn list_for_subject(conn: &Connection, subject_id: &str) -> StoreResult<Vec<AssignmentRecord>> {
    let sql = format!("{ASSIGNMENT_SELECT} WHERE subject_id = ? ORDER BY due_date, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([subject_id], row_to_assignment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The student view: assignments for every subject of a branch+semester.
pub fn list_for_branch_semester(
    conn: &Connection,
    branch: &str,
    semester: i64,
) -> StoreResult<Vec<AssignmentRecord>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.subject_id, a.title, a.description, a.due_date, a.faculty_uid, a.version, a.created_at
         FROM assignments a
         JOIN subjects s ON s.id = a.subject_id
         WHERE s.branch = ? AND s.semester = ?
         ORDER BY a.due_date, a.id",
    )?;
    let rows = stmt
        .query_map(params![branch, semester], row_to_assignment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
