use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::{new_id, now_rfc3339, StoreError, StoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub id: String,
    pub reporter_uid: String,
    pub category: String,
    pub message: String,
    pub status: String,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

const REPORT_SELECT: &str = "SELECT
    id, reporter_uid, category, message, status, created_at, resolved_at
FROM reports";

fn row_to_report(r: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRecord> {
    Ok(ReportRecord {
        id: r.get(0)?,
        reporter_uid: r.get(1)?,
        category: r.get(2)?,
        message: r.get(3)?,
        status: r.get(4)?,
        created_at: r.get(5)?,
        resolved_at: r.get(6)?,
    })
}

pub fn get(conn: &Connection, id: &str) -> StoreResult<ReportRecord> {
    let sql = format!("{REPORT_SELECT} WHERE id = ?");
    conn.query_row(&sql, [id], row_to_report)
        .optional()?
        .ok_or(StoreError::NotFound("report"))
}

pub fn submit(
    conn: &Connection,
    reporter_uid: &str,
    category: &str,
    message: &str,
) -> StoreResult<ReportRecord> {
    let id = new_id();
    conn.execute(
        "INSERT INTO reports(id, reporter_uid, category, message, status, created_at, resolved_at)
         VALUES(?, ?, ?, ?, 'open', ?, NULL)",
        params![id, reporter_uid, category, message, now_rfc3339()],
    )?;
    get(conn, &id)
}

/// Admins see everything; everyone else sees their own submissions.
pub fn list(conn: &Connection, reporter_uid: Option<&str>) -> StoreResult<Vec<ReportRecord>> {
    let sql = format!(
        "{REPORT_SELECT} WHERE ?1 IS NULL OR reporter_uid = ?1 ORDER BY created_at DESC, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([reporter_uid], row_to_report)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn resolve(conn: &Connection, id: &str) -> StoreResult<ReportRecord> {
    let current = get(conn, id)?;
    if current.status == "resolved" {
        return Ok(current);
    }
    conn.execute(
        "UPDATE reports SET status = 'resolved', resolved_at = ? WHERE id = ?",
        params![now_rfc3339(), id],
    )?;
    get(conn, id)
}
