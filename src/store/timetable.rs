use rusqlite::{params, Connection};
use serde::Serialize;

use super::StoreResult;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub day: i64,
    pub period: i64,
    pub subject_id: String,
    pub subject_code: Option<String>,
    pub subject_name: Option<String>,
}

/// `subject_id = None` clears the slot; otherwise the slot is upserted.
pub fn set_slot(
    conn: &Connection,
    branch: &str,
    semester: i64,
    day: i64,
    period: i64,
    subject_id: Option<&str>,
) -> StoreResult<()> {
    match subject_id {
        Some(subject_id) => {
            conn.execute(
                "INSERT INTO timetable_slots(branch, semester, day, period, subject_id)
                 VALUES(?, ?, ?, ?, ?)
                 ON CONFLICT(branch, semester, day, period) DO UPDATE SET
                   subject_id = excluded.subject_id",
                params![branch, semester, day, period, subject_id],
            )?;
        }
        None => {
            conn.execute(
                "DELETE FROM timetable_slots WHERE branch = ? AND semester = ? AND day = ? AND period = ?",
                params![branch, semester, day, period],
            )?;
        }
    }
    Ok(())
}

pub fn grid(conn: &Connection, branch: &str, semester: i64) -> StoreResult<Vec<SlotView>> {
    let mut stmt = conn.prepare(
        "SELECT t.day, t.period, t.subject_id, s.code, s.name
         FROM timetable_slots t
         LEFT JOIN subjects s ON s.id = t.subject_id
         WHERE t.branch = ? AND t.semester = ?
         ORDER BY t.day, t.period",
    )?;
    let rows = stmt
        .query_map(params![branch, semester], |r| {
            Ok(SlotView {
                day: r.get(0)?,
                period: r.get(1)?,
                subject_id: r.get(2)?,
                subject_code: r.get(3)?,
                subject_name: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
