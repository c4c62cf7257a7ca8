use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{now_rfc3339, StoreError, StoreResult};
use crate::notify::NotificationDraft;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub user_uid: String,
    #[serde(rename = "type")]
    pub ntype: String,
    pub message: String,
    pub related_id: String,
    pub is_read: bool,
    pub created_at: String,
}

/// Per-user gates over which conditions may surface. Absent rows read as
/// everything enabled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPrefs {
    pub fee_due: bool,
    pub low_attendance: bool,
    pub assignment_due: bool,
    pub approval_pending: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            fee_due: true,
            low_attendance: true,
            assignment_due: true,
            approval_pending: true,
        }
    }
}

const NOTIFICATION_SELECT: &str = "SELECT
    id, user_uid, ntype, message, related_id, is_read, created_at
FROM notifications";

fn row_to_notification(r: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationRecord> {
    Ok(NotificationRecord {
        id: r.get(0)?,
        user_uid: r.get(1)?,
        ntype: r.get(2)?,
        message: r.get(3)?,
        related_id: r.get(4)?,
        is_read: r.get::<_, i64>(5)? != 0,
        created_at: r.get(6)?,
    })
}

/// Inserts drafts with OR IGNORE on the deterministic id. A condition that
/// already produced a notification leaves the stored row alone, including
/// its read flag, so regeneration is idempotent.
pub fn insert_new(conn: &Connection, drafts: &[NotificationDraft]) -> StoreResult<usize> {
    let tx = conn.unchecked_transaction()?;
    let now = now_rfc3339();
    let mut inserted = 0usize;
    for draft in drafts {
        inserted += tx.execute(
            "INSERT OR IGNORE INTO notifications(id, user_uid, ntype, message, related_id, is_read, created_at)
             VALUES(?, ?, ?, ?, ?, 0, ?)",
            params![
                draft.id,
                draft.user_uid,
                draft.ntype.as_str(),
                draft.message,
                draft.related_id,
                now
            ],
        )?;
    }
    tx.commit()?;
    Ok(inserted)
}

pub fn list_for_user(
    conn: &Connection,
    user_uid: &str,
    unread_only: bool,
) -> StoreResult<Vec<NotificationRecord>> {
    let mut sql = format!("{NOTIFICATION_SELECT} WHERE user_uid = ?");
    if unread_only {
        sql.push_str(" AND is_read = 0");
    }
    sql.push_str(" ORDER BY created_at DESC, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_uid], row_to_notification)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Scoped to the owner: marking someone else's notification is a not-found.
pub fn mark_read(conn: &Connection, user_uid: &str, id: &str) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ? AND user_uid = ?",
        params![id, user_uid],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound("notification"));
    }
    Ok(())
}

pub fn mark_all_read(conn: &Connection, user_uid: &str) -> StoreResult<usize> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_uid = ? AND is_read = 0",
        [user_uid],
    )?;
    Ok(changed)
}

pub fn prefs_get(conn: &Connection, user_uid: &str) -> StoreResult<NotificationPrefs> {
    let row = conn
        .query_row(
            "SELECT fee_due, low_attendance, assignment_due, approval_pending
             FROM notification_prefs WHERE user_uid = ?",
            [user_uid],
            |r| {
                Ok(NotificationPrefs {
                    fee_due: r.get::<_, i64>(0)? != 0,
                    low_attendance: r.get::<_, i64>(1)? != 0,
                    assignment_due: r.get::<_, i64>(2)? != 0,
                    approval_pending: r.get::<_, i64>(3)? != 0,
                })
            },
        )
        .optional()?;
    Ok(row.unwrap_or_default())
}

pub fn prefs_set(
    conn: &Connection,
    user_uid: &str,
    prefs: &NotificationPrefs,
) -> StoreResult<NotificationPrefs> {
    conn.execute(
        "INSERT INTO notification_prefs(user_uid, fee_due, low_attendance, assignment_due, approval_pending)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(user_uid) DO UPDATE SET
           fee_due = excluded.fee_due,
           low_attendance = excluded.low_attendance,
           assignment_due = excluded.assignment_due,
           approval_pending = excluded.approval_pending",
        params![
            user_uid,
            prefs.fee_due as i64,
            prefs.low_attendance as i64,
            prefs.assignment_due as i64,
            prefs.approval_pending as i64
        ],
    )?;
    prefs_get(conn, user_uid)
}
