use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::{new_id, now_rfc3339, StoreError, StoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_by: String,
    pub member_count: i64,
    pub joined: bool,
}

fn row_to_view(r: &rusqlite::Row<'_>) -> rusqlite::Result<ClubView> {
    Ok(ClubView {
        id: r.get(0)?,
        name: r.get(1)?,
        description: r.get(2)?,
        created_by: r.get(3)?,
        member_count: r.get(4)?,
        joined: r.get::<_, i64>(5)? != 0,
    })
}

const VIEW_SELECT: &str = "SELECT c.id, c.name, c.description, c.created_by,
        (SELECT COUNT(*) FROM club_members m WHERE m.club_id = c.id),
        EXISTS(SELECT 1 FROM club_members m WHERE m.club_id = c.id AND m.user_uid = ?1)
 FROM clubs c";

pub fn get_view(conn: &Connection, id: &str, viewer_uid: &str) -> StoreResult<ClubView> {
    let sql = format!("{VIEW_SELECT} WHERE c.id = ?2");
    conn.query_row(&sql, params![viewer_uid, id], row_to_view)
        .optional()?
        .ok_or(StoreError::NotFound("club"))
}

pub fn name_taken(conn: &Connection, name: &str) -> StoreResult<bool> {
    let hit: Option<String> = conn
        .query_row("SELECT id FROM clubs WHERE name = ?", [name], |r| r.get(0))
        .optional()?;
    Ok(hit.is_some())
}

pub fn create(
    conn: &Connection,
    name: &str,
    description: &str,
    created_by: &str,
) -> StoreResult<ClubView> {
    let id = new_id();
    conn.execute(
        "INSERT INTO clubs(id, name, description, created_by) VALUES(?, ?, ?, ?)",
        params![id, name, description, created_by],
    )?;
    get_view(conn, &id, created_by)
}

pub fn list(conn: &Connection, viewer_uid: &str) -> StoreResult<Vec<ClubView>> {
    let sql = format!("{VIEW_SELECT} ORDER BY c.name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([viewer_uid], row_to_view)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Joining twice is a no-op.
pub fn join(conn: &Connection, id: &str, user_uid: &str) -> StoreResult<ClubView> {
    get_view(conn, id, user_uid)?;
    conn.execute(
        "INSERT OR IGNORE INTO club_members(club_id, user_uid, joined_at) VALUES(?, ?, ?)",
        params![id, user_uid, now_rfc3339()],
    )?;
    get_view(conn, id, user_uid)
}

pub fn leave(conn: &Connection, id: &str, user_uid: &str) -> StoreResult<ClubView> {
    get_view(conn, id, user_uid)?;
    conn.execute(
        "DELETE FROM club_members WHERE club_id = ? AND user_uid = ?",
        params![id, user_uid],
    )?;
    get_view(conn, id, user_uid)
}
