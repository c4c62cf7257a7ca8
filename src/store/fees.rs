use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{check_version, new_id, now_rfc3339, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    Pending,
    Paid,
}

impl FeeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FeeStatus::Pending => "pending",
            FeeStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<FeeStatus> {
        match s {
            "pending" => Some(FeeStatus::Pending),
            "paid" => Some(FeeStatus::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRecord {
    pub id: String,
    pub student_uid: String,
    pub title: String,
    pub amount: f64,
    pub due_date: String,
    pub status: FeeStatus,
    pub paid_at: Option<String>,
    pub version: i64,
    pub created_at: String,
}

const FEE_SELECT: &str = "SELECT
    id, student_uid, title, amount, due_date, status, paid_at, version, created_at
FROM fee_records";

fn row_to_fee(r: &rusqlite::Row<'_>) -> rusqlite::Result<FeeRecord> {
    let status: String = r.get(5)?;
    let status = FeeStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown fee status: {status}").into(),
        )
    })?;
    Ok(FeeRecord {
        id: r.get(0)?,
        student_uid: r.get(1)?,
        title: r.get(2)?,
        amount: r.get(3)?,
        due_date: r.get(4)?,
        status,
        paid_at: r.get(6)?,
        version: r.get(7)?,
        created_at: r.get(8)?,
    })
}

pub fn get_opt(conn: &Connection, id: &str) -> StoreResult<Option<FeeRecord>> {
    let sql = format!("{FEE_SELECT} WHERE id = ?");
    Ok(conn.query_row(&sql, [id], row_to_fee).optional()?)
}

pub fn get(conn: &Connection, id: &str) -> StoreResult<FeeRecord> {
    get_opt(conn, id)?.ok_or(StoreError::NotFound("fee record"))
}

pub struct FeeUpsert {
    pub id: Option<String>,
    pub student_uid: String,
    pub title: String,
    pub amount: f64,
    pub due_date: String,
    pub expected_version: Option<i64>,
}

pub fn upsert(conn: &Connection, up: &FeeUpsert) -> StoreResult<FeeRecord> {
    match &up.id {
        Some(id) => {
            let current = get(conn, id)?;
            check_version(up.expected_version, current.version)?;
            conn.execute(
                "UPDATE fee_records SET student_uid = ?, title = ?, amount = ?, due_date = ?,
                        version = version + 1
                 WHERE id = ?",
                params![up.student_uid, up.title, up.amount, up.due_date, id],
            )?;
            get(conn, id)
        }
        None => {
            let id = new_id();
            conn.execute(
                "INSERT INTO fee_records(id, student_uid, title, amount, due_date, status, paid_at, version, created_at)
                 VALUES(?, ?, ?, ?, ?, 'pending', NULL, 1, ?)",
                params![id, up.student_uid, up.title, up.amount, up.due_date, now_rfc3339()],
            )?;
            get(conn, &id)
        }
    }
}

/// Idempotent: marking an already-paid record again is a no-op.
pub fn mark_paid(conn: &Connection, id: &str) -> StoreResult<FeeRecord> {
    let current = get(conn, id)?;
    if current.status == FeeStatus::Paid {
        return Ok(current);
    }
    conn.execute(
        "UPDATE fee_records SET status = 'paid', paid_at = ?, version = version + 1 WHERE id = ?",
        params![now_rfc3339(), id],
    )?;
    get(conn, id)
}

pub fn list_for_student(conn: &Connection, student_uid: &str) -> StoreResult<Vec<FeeRecord>> {
    let sql = format!("{FEE_SELECT} WHERE student_uid = ? ORDER BY due_date, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([student_uid], row_to_fee)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct BranchFeeRow {
    pub student_uid: String,
    pub student_name: String,
    pub status: FeeStatus,
    pub amount: f64,
}

pub fn rows_for_branch(conn: &Connection, branch: Option<&str>) -> StoreResult<Vec<BranchFeeRow>> {
    let sql = "SELECT f.student_uid, COALESCE(u.name, f.student_uid), f.status, f.amount
         FROM fee_records f
         LEFT JOIN users u ON u.uid = f.student_uid
         WHERE ?1 IS NULL OR u.branch = ?1
         ORDER BY f.student_uid, f.due_date";
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([branch], |r| {
            let status: String = r.get(2)?;
            let status = FeeStatus::parse(&status).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("unknown fee status: {status}").into(),
                )
            })?;
            Ok(BranchFeeRow {
                student_uid: r.get(0)?,
                student_name: r.get(1)?,
                status,
                amount: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
