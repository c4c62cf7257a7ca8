use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "apsconnect.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            uid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            role TEXT NOT NULL,
            requested_role TEXT NOT NULL,
            branch TEXT,
            semester INTEGER,
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)", [])?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_branch ON users(branch, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            branch TEXT NOT NULL,
            semester INTEGER NOT NULL,
            faculty_uid TEXT,
            UNIQUE(code, branch, semester)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_branch ON subjects(branch, semester)",
        [],
    )?;

    // One row per student/subject/day. Re-marking the same day upserts.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            id TEXT PRIMARY KEY,
            student_uid TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            marked_by TEXT NOT NULL,
            UNIQUE(student_uid, subject_id, date),
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance_records(student_uid)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_subject ON attendance_records(subject_id)",
        [],
    )?;

    // status is 'pending' or 'paid'; overdue is derived from due_date at read time.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS fee_records(
            id TEXT PRIMARY KEY,
            student_uid TEXT NOT NULL,
            title TEXT NOT NULL,
            amount REAL NOT NULL,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            paid_at TEXT,
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_fee_records_student ON fee_records(student_uid)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            due_date TEXT NOT NULL,
            faculty_uid TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_subject ON assignments(subject_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS study_materials(
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            description TEXT NOT NULL,
            uploaded_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_study_materials_subject ON study_materials(subject_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS posts(
            id TEXT PRIMARY KEY,
            author_uid TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS post_likes(
            post_id TEXT NOT NULL,
            user_uid TEXT NOT NULL,
            PRIMARY KEY(post_id, user_uid),
            FOREIGN KEY(post_id) REFERENCES posts(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reports(
            id TEXT PRIMARY KEY,
            reporter_uid TEXT NOT NULL,
            category TEXT NOT NULL,
            message TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open',
            created_at TEXT NOT NULL,
            resolved_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reports_reporter ON reports(reporter_uid)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS fundraising_campaigns(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            goal_amount REAL NOT NULL,
            deadline TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    // The raised amount is always SUM(donations), never a stored counter.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS donations(
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL,
            donor_uid TEXT NOT NULL,
            amount REAL NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(campaign_id) REFERENCES fundraising_campaigns(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_donations_campaign ON donations(campaign_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS clubs(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL,
            created_by TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS club_members(
            club_id TEXT NOT NULL,
            user_uid TEXT NOT NULL,
            joined_at TEXT NOT NULL,
            PRIMARY KEY(club_id, user_uid),
            FOREIGN KEY(club_id) REFERENCES clubs(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_slots(
            branch TEXT NOT NULL,
            semester INTEGER NOT NULL,
            day INTEGER NOT NULL,
            period INTEGER NOT NULL,
            subject_id TEXT NOT NULL,
            PRIMARY KEY(branch, semester, day, period),
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;

    // id is the deterministic "{uid}-{type}-{relatedId}" key; generation
    // inserts with OR IGNORE so re-running a pass never duplicates or
    // resets is_read.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS notifications(
            id TEXT PRIMARY KEY,
            user_uid TEXT NOT NULL,
            ntype TEXT NOT NULL,
            message TEXT NOT NULL,
            related_id TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_uid)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notification_prefs(
            user_uid TEXT PRIMARY KEY,
            fee_due INTEGER NOT NULL DEFAULT 1,
            low_attendance INTEGER NOT NULL DEFAULT 1,
            assignment_due INTEGER NOT NULL DEFAULT 1,
            approval_pending INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    seed_default_admin(&conn)?;

    Ok(conn)
}

// A fresh workspace needs one account that can approve the rest.
fn seed_default_admin(conn: &Connection) -> anyhow::Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
    if count > 0 {
        return Ok(());
    }
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    conn.execute(
        "INSERT INTO users(uid, name, email, password, role, requested_role, branch, semester, version, created_at, updated_at)
         VALUES('admin', 'Administrator', 'admin@apsconnect.local', 'admin', 'admin', 'admin', NULL, NULL, 1, ?, ?)",
        (&now, &now),
    )?;
    Ok(())
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, &serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// A missing or malformed stored value reads as `None`; callers fall back
/// to their defaults.
pub fn settings_get_json(conn: &Connection, key: &str) -> Option<serde_json::Value> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| r.get(0))
        .optional()
        .ok()
        .flatten();
    raw.and_then(|s| serde_json::from_str(&s).ok())
}
