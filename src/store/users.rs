use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{check_version, now_rfc3339, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
    Pending,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
            Role::Pending => "pending",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "student" => Some(Role::Student),
            "faculty" => Some(Role::Faculty),
            "admin" => Some(Role::Admin),
            "pending" => Some(Role::Pending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub uid: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
    pub requested_role: Role,
    pub branch: Option<String>,
    pub semester: Option<i64>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

const USER_SELECT: &str = "SELECT
    uid, name, email, password, role, requested_role,
    branch, semester, version, created_at, updated_at
FROM users";

fn role_from_sql(idx: usize, raw: String) -> rusqlite::Result<Role> {
    Role::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown role: {raw}").into(),
        )
    })
}

fn row_to_user(r: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let role: String = r.get(4)?;
    let requested: String = r.get(5)?;
    Ok(UserRecord {
        uid: r.get(0)?,
        name: r.get(1)?,
        email: r.get(2)?,
        password: r.get(3)?,
        role: role_from_sql(4, role)?,
        requested_role: role_from_sql(5, requested)?,
        branch: r.get(6)?,
        semester: r.get(7)?,
        version: r.get(8)?,
        created_at: r.get(9)?,
        updated_at: r.get(10)?,
    })
}

pub struct NewUser {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub requested_role: Role,
    pub branch: Option<String>,
    pub semester: Option<i64>,
}

pub fn get_opt(conn: &Connection, uid: &str) -> StoreResult<Option<UserRecord>> {
    let sql = format!("{USER_SELECT} WHERE uid = ?");
    Ok(conn.query_row(&sql, [uid], row_to_user).optional()?)
}

pub fn get(conn: &Connection, uid: &str) -> StoreResult<UserRecord> {
    get_opt(conn, uid)?.ok_or(StoreError::NotFound("user"))
}

pub fn email_taken(conn: &Connection, email: &str, exclude_uid: Option<&str>) -> StoreResult<bool> {
    let taken: Option<String> = conn
        .query_row(
            "SELECT uid FROM users WHERE email = ?",
            [email],
            |r| r.get(0),
        )
        .optional()?;
    Ok(match (taken, exclude_uid) {
        (Some(owner), Some(exclude)) => owner != exclude,
        (Some(_), None) => true,
        (None, _) => false,
    })
}

/// Registration always lands as `pending`; the requested role is applied
/// on approval.
pub fn insert_pending(conn: &Connection, user: &NewUser) -> StoreResult<UserRecord> {
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO users(uid, name, email, password, role, requested_role, branch, semester, version, created_at, updated_at)
         VALUES(?, ?, ?, ?, 'pending', ?, ?, ?, 1, ?, ?)",
        params![
            user.uid,
            user.name,
            user.email,
            user.password,
            user.requested_role.as_str(),
            user.branch,
            user.semester,
            now,
            now
        ],
    )?;
    get(conn, &user.uid)
}

pub fn list(
    conn: &Connection,
    role: Option<Role>,
    branch: Option<&str>,
) -> StoreResult<Vec<UserRecord>> {
    let mut sql = String::from(USER_SELECT);
    let mut clauses: Vec<&str> = Vec::new();
    let mut args: Vec<Value> = Vec::new();
    if let Some(role) = role {
        clauses.push("role = ?");
        args.push(Value::Text(role.as_str().to_string()));
    }
    if let Some(branch) = branch {
        clauses.push("branch = ?");
        args.push(Value::Text(branch.to_string()));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at, uid");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args), row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_pending(conn: &Connection) -> StoreResult<Vec<UserRecord>> {
    list(conn, Some(Role::Pending), None)
}

pub fn approve(conn: &Connection, uid: &str) -> StoreResult<UserRecord> {
    let user = get(conn, uid)?;
    if user.role != Role::Pending {
        return Err(StoreError::Invalid(format!(
            "user {uid} is not awaiting approval"
        )));
    }
    conn.execute(
        "UPDATE users SET role = requested_role, version = version + 1, updated_at = ? WHERE uid = ?",
        (now_rfc3339(), uid),
    )?;
    get(conn, uid)
}

pub fn reject(conn: &Connection, uid: &str) -> StoreResult<()> {
    let user = get(conn, uid)?;
    if user.role != Role::Pending {
        return Err(StoreError::Invalid(format!(
            "user {uid} is not awaiting approval"
        )));
    }
    conn.execute("DELETE FROM users WHERE uid = ?", [uid])?;
    Ok(())
}

#[derive(Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<i64>,
    pub expected_version: Option<i64>,
}

pub fn update(conn: &Connection, uid: &str, patch: &UserPatch) -> StoreResult<UserRecord> {
    let current = get(conn, uid)?;
    check_version(patch.expected_version, current.version)?;
    let name = patch.name.clone().unwrap_or(current.name);
    let email = patch.email.clone().unwrap_or(current.email);
    let password = patch.password.clone().unwrap_or(current.password);
    let branch = patch.branch.clone().or(current.branch);
    let semester = patch.semester.or(current.semester);
    conn.execute(
        "UPDATE users SET name = ?, email = ?, password = ?, branch = ?, semester = ?,
                version = version + 1, updated_at = ?
         WHERE uid = ?",
        params![name, email, password, branch, semester, now_rfc3339(), uid],
    )?;
    get(conn, uid)
}

/// Removes the account plus everything private to it. Posts, reports, fee
/// and attendance rows stay behind as history keyed by the bare uid.
pub fn delete(conn: &Connection, uid: &str) -> StoreResult<()> {
    get(conn, uid)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM notifications WHERE user_uid = ?", [uid])?;
    tx.execute("DELETE FROM notification_prefs WHERE user_uid = ?", [uid])?;
    tx.execute("DELETE FROM post_likes WHERE user_uid = ?", [uid])?;
    tx.execute("DELETE FROM club_members WHERE user_uid = ?", [uid])?;
    tx.execute("DELETE FROM users WHERE uid = ?", [uid])?;
    tx.commit()?;
    Ok(())
}
