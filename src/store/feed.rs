use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::{new_id, now_rfc3339, StoreError, StoreResult};

/// A post as one viewer sees it; like state is per-viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub author_uid: String,
    pub author_name: Option<String>,
    pub content: String,
    pub created_at: String,
    pub like_count: i64,
    pub liked_by_me: bool,
}

pub fn create(conn: &Connection, author_uid: &str, content: &str) -> StoreResult<PostView> {
    let id = new_id();
    conn.execute(
        "INSERT INTO posts(id, author_uid, content, created_at) VALUES(?, ?, ?, ?)",
        params![id, author_uid, content, now_rfc3339()],
    )?;
    get_view(conn, &id, author_uid)
}

fn row_to_view(r: &rusqlite::Row<'_>) -> rusqlite::Result<PostView> {
    Ok(PostView {
        id: r.get(0)?,
        author_uid: r.get(1)?,
        author_name: r.get(2)?,
        content: r.get(3)?,
        created_at: r.get(4)?,
        like_count: r.get(5)?,
        liked_by_me: r.get::<_, i64>(6)? != 0,
    })
}

const VIEW_SELECT: &str = "SELECT p.id, p.author_uid, u.name, p.content, p.created_at,
        (SELECT COUNT(*) FROM post_likes pl WHERE pl.post_id = p.id),
        EXISTS(SELECT 1 FROM post_likes pl WHERE pl.post_id = p.id AND pl.user_uid = ?1)
 FROM posts p
 LEFT JOIN users u ON u.uid = p.author_uid";

pub fn get_view(conn: &Connection, id: &str, viewer_uid: &str) -> StoreResult<PostView> {
    let sql = format!("{VIEW_SELECT} WHERE p.id = ?2");
    conn.query_row(&sql, params![viewer_uid, id], row_to_view)
        .optional()?
        .ok_or(StoreError::NotFound("post"))
}

pub fn list(conn: &Connection, viewer_uid: &str, limit: i64) -> StoreResult<Vec<PostView>> {
    // rowid breaks ties between posts created within the same second.
    let sql = format!("{VIEW_SELECT} ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?2");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![viewer_uid, limit], row_to_view)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn author_of(conn: &Connection, id: &str) -> StoreResult<String> {
    conn.query_row("SELECT author_uid FROM posts WHERE id = ?", [id], |r| r.get(0))
        .optional()?
        .ok_or(StoreError::NotFound("post"))
}

pub fn like(conn: &Connection, id: &str, user_uid: &str) -> StoreResult<()> {
    author_of(conn, id)?;
    conn.execute(
        "INSERT OR IGNORE INTO post_likes(post_id, user_uid) VALUES(?, ?)",
        params![id, user_uid],
    )?;
    Ok(())
}

pub fn unlike(conn: &Connection, id: &str, user_uid: &str) -> StoreResult<()> {
    author_of(conn, id)?;
    conn.execute(
        "DELETE FROM post_likes WHERE post_id = ? AND user_uid = ?",
        params![id, user_uid],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: &str) -> StoreResult<()> {
    author_of(conn, id)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM post_likes WHERE post_id = ?", [id])?;
    tx.execute("DELETE FROM posts WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(())
}
