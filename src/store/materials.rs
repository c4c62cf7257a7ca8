use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::{new_id, now_rfc3339, StoreError, StoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRecord {
    pub id: String,
    pub subject_id: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub uploaded_by: String,
    pub created_at: String,
}

const MATERIAL_SELECT: &str = "SELECT
    id, subject_id, title, url, description, uploaded_by, created_at
FROM study_materials";

fn row_to_material(r: &rusqlite::Row<'_>) -> rusqlite::Result<MaterialRecord> {
    Ok(MaterialRecord {
        id: r.get(0)?,
        subject_id: r.get(1)?,
        title: r.get(2)?,
        url: r.get(3)?,
        description: r.get(4)?,
        uploaded_by: r.get(5)?,
        created_at: r.get(6)?,
    })
}

pub fn get(conn: &Connection, id: &str) -> StoreResult<MaterialRecord> {
    let sql = format!("{MATERIAL_SELECT} WHERE id = ?");
    conn.query_row(&sql, [id], row_to_material)
        .optional()?
        .ok_or(StoreError::NotFound("study material"))
}

pub fn upload(
    conn: &Connection,
    subject_id: &str,
    title: &str,
    url: &str,
    description: &str,
    uploaded_by: &str,
) -> StoreResult<MaterialRecord> {
    let id = new_id();
    conn.execute(
        "INSERT INTO study_materials(id, subject_id, title, url, description, uploaded_by, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![id, subject_id, title, url, description, uploaded_by, now_rfc3339()],
    )?;
    get(conn, &id)
}

pub fn delete(conn: &Connection, id: &str) -> StoreResult<()> {
    get(conn, id)?;
    conn.execute("DELETE FROM study_materials WHERE id = ?", [id])?;
    Ok(())
}

pub fn list_for_subject(conn: &Connection, subject_id: &str) -> StoreResult<Vec<MaterialRecord>> {
    let sql = format!("{MATERIAL_SELECT} WHERE subject_id = ? ORDER BY created_at, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([subject_id], row_to_material)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_for_branch_semester(
    conn: &Connection,
    branch: &str,
    semester: i64,
) -> StoreResult<Vec<MaterialRecord>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.subject_id, m.title, m.url, m.description, m.uploaded_by, m.created_at
         FROM study_materials m
         JOIN subjects s ON s.id = m.subject_id
         WHERE s.branch = ? AND s.semester = ?
         ORDER BY m.created_at, m.id",
    )?;
    let rows = stmt
        .query_map(params![branch, semester], row_to_material)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
