use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{new_id, StoreResult};
use crate::calc::SubjectCounts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Present => "present",
            Status::Absent => "absent",
        }
    }

    pub fn parse(s: &str) -> Option<Status> {
        match s {
            "present" => Some(Status::Present),
            "absent" => Some(Status::Absent),
            _ => None,
        }
    }
}

pub struct MarkEntry {
    pub student_uid: String,
    pub status: Status,
}

/// Bulk-marks one subject/date in a single transaction. Entries for uids
/// that are not registered users are skipped rather than failing the whole
/// batch. Re-marking a student for the same day replaces the earlier row.
pub fn mark_bulk(
    conn: &Connection,
    subject_id: &str,
    date: &str,
    marked_by: &str,
    entries: &[MarkEntry],
) -> StoreResult<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut marked = 0usize;
    for entry in entries {
        let exists = tx
            .query_row(
                "SELECT 1 FROM users WHERE uid = ? AND role = 'student'",
                [&entry.student_uid],
                |r| r.get::<_, i64>(0),
            )
            .optional()?
            .is_some();
        if !exists {
            continue;
        }
        tx.execute(
            "INSERT INTO attendance_records(id, student_uid, subject_id, date, status, marked_by)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_uid, subject_id, date) DO UPDATE SET
               status = excluded.status,
               marked_by = excluded.marked_by",
            params![
                new_id(),
                entry.student_uid,
                subject_id,
                date,
                entry.status.as_str(),
                marked_by
            ],
        )?;
        marked += 1;
    }
    tx.commit()?;
    Ok(marked)
}

pub fn counts_for_student(conn: &Connection, student_uid: &str) -> StoreResult<Vec<SubjectCounts>> {
    let mut stmt = conn.prepare(
        "SELECT a.subject_id, s.code, s.name,
                SUM(CASE WHEN a.status = 'present' THEN 1 ELSE 0 END),
                COUNT(*)
         FROM attendance_records a
         LEFT JOIN subjects s ON s.id = a.subject_id
         WHERE a.student_uid = ?
         GROUP BY a.subject_id
         ORDER BY s.code, a.subject_id",
    )?;
    let rows = stmt
        .query_map([student_uid], |r| {
            Ok(SubjectCounts {
                subject_id: r.get(0)?,
                subject_code: r.get(1)?,
                subject_name: r.get(2)?,
                present: r.get(3)?,
                total: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct StudentCounts {
    pub student_uid: String,
    pub student_name: String,
    pub present: i64,
    pub total: i64,
}

pub fn counts_for_branch(
    conn: &Connection,
    branch: &str,
    semester: Option<i64>,
) -> StoreResult<Vec<StudentCounts>> {
    let sql = "SELECT u.uid, u.name,
                COALESCE(SUM(CASE WHEN a.status = 'present' THEN 1 ELSE 0 END), 0),
                COUNT(a.id)
         FROM users u
         LEFT JOIN attendance_records a ON a.student_uid = u.uid
         WHERE u.role = 'student' AND u.branch = ? AND (?2 IS NULL OR u.semester = ?2)
         GROUP BY u.uid
         ORDER BY u.uid";
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![branch, semester], |r| {
            Ok(StudentCounts {
                student_uid: r.get(0)?,
                student_name: r.get(1)?,
                present: r.get(2)?,
                total: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
