use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn days_from_today(days: i64) -> String {
    (chrono::Local::now().date_naive() + chrono::Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

fn spawn_daemon() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_apsconnectd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn apsconnectd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert!(
        !value.get("ok").and_then(|v| v.as_bool()).unwrap_or(true),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value["error"]["code"].as_str().expect("error code").to_string()
}

#[test]
fn generation_is_idempotent_and_preserves_read_state() {
    let workspace = temp_dir("apsconnect-notify");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    let s = &mut stdin;
    let r = &mut reader;

    request_ok(
        s,
        r,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        s,
        r,
        "2",
        "auth.signIn",
        json!({ "uid": "admin", "password": "admin" }),
    );
    request_ok(
        s,
        r,
        "3",
        "auth.register",
        json!({
            "uid": "1AP21CS001",
            "name": "Asha Rao",
            "email": "asha@example.edu",
            "password": "pw",
            "role": "student",
            "branch": "CSE",
            "semester": 5,
        }),
    );
    request_ok(s, r, "4", "users.approve", json!({ "uid": "1AP21CS001" }));

    // One unpaid fee.
    let fee = request_ok(
        s,
        r,
        "5",
        "fees.upsert",
        json!({
            "studentUid": "1AP21CS001",
            "title": "Semester 5 tuition",
            "amount": 5000.0,
            "dueDate": days_from_today(10),
        }),
    );
    let fee_id = fee["fee"]["id"].as_str().expect("fee id").to_string();

    // Attendance at 33%, well under the 75% default threshold.
    let subject = request_ok(
        s,
        r,
        "6",
        "subjects.create",
        json!({ "code": "DS", "name": "Data Structures", "branch": "CSE", "semester": 5 }),
    );
    let subject_id = subject["subject"]["id"].as_str().expect("subject id").to_string();
    for (id, date, status) in [
        ("7", "2026-08-03", "present"),
        ("8", "2026-08-04", "absent"),
        ("9", "2026-08-05", "absent"),
    ] {
        request_ok(
            s,
            r,
            id,
            "attendance.mark",
            json!({
                "subjectId": subject_id,
                "date": date,
                "entries": [{ "studentUid": "1AP21CS001", "status": status }],
            }),
        );
    }

    // One assignment due inside the 3-day window.
    let assignment = request_ok(
        s,
        r,
        "10",
        "assignments.create",
        json!({
            "subjectId": subject_id,
            "title": "Lab record",
            "dueDate": days_from_today(2),
        }),
    );
    let assignment_id = assignment["assignment"]["id"]
        .as_str()
        .expect("assignment id")
        .to_string();

    request_ok(s, r, "11", "auth.signOut", json!({}));
    request_ok(
        s,
        r,
        "12",
        "auth.signIn",
        json!({ "uid": "1AP21CS001", "password": "pw" }),
    );

    let generated = request_ok(s, r, "13", "notifications.generate", json!({}));
    assert_eq!(generated["generated"], 3);
    let items = generated["notifications"].as_array().expect("items");
    assert_eq!(items.len(), 3);
    let mut ids: Vec<&str> = items.iter().filter_map(|n| n["id"].as_str()).collect();
    ids.sort_unstable();
    let mut expected = vec![
        format!("1AP21CS001-fee_due-{fee_id}"),
        format!("1AP21CS001-low_attendance-{subject_id}"),
        format!("1AP21CS001-assignment_due-{assignment_id}"),
    ];
    expected.sort_unstable();
    assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(items.iter().all(|n| n["isRead"] == false));
    assert!(items.iter().all(|n| n["userUid"] == "1AP21CS001"));

    // Unchanged data: a second pass adds nothing.
    let again = request_ok(s, r, "14", "notifications.generate", json!({}));
    assert_eq!(again["generated"], 0);
    assert_eq!(again["notifications"].as_array().expect("items").len(), 3);

    // Reading one survives further regeneration.
    let read_id = format!("1AP21CS001-fee_due-{fee_id}");
    request_ok(s, r, "15", "notifications.markRead", json!({ "id": read_id }));
    let after = request_ok(s, r, "16", "notifications.generate", json!({}));
    assert_eq!(after["generated"], 0);
    let read_flags: Vec<bool> = after["notifications"]
        .as_array()
        .expect("items")
        .iter()
        .filter(|n| n["id"] == read_id.as_str())
        .map(|n| n["isRead"].as_bool().expect("isRead"))
        .collect();
    assert_eq!(read_flags, vec![true]);

    let listed = request_ok(s, r, "17", "notifications.list", json!({ "unreadOnly": true }));
    assert_eq!(listed["notifications"].as_array().expect("items").len(), 2);

    let marked = request_ok(s, r, "18", "notifications.markAllRead", json!({}));
    assert_eq!(marked["marked"], 2);
    let listed = request_ok(s, r, "19", "notifications.list", json!({}));
    assert_eq!(listed["unreadCount"], 0);

    let _ = child.kill();
}

#[test]
fn admin_sees_pending_approvals_and_users_stay_isolated() {
    let workspace = temp_dir("apsconnect-notify-scope");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    let s = &mut stdin;
    let r = &mut reader;

    request_ok(
        s,
        r,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        s,
        r,
        "2",
        "auth.register",
        json!({
            "uid": "1AP21CS050",
            "name": "Pending Person",
            "email": "pending@example.edu",
            "password": "pw",
            "role": "student",
            "branch": "CSE",
            "semester": 3,
        }),
    );
    request_ok(
        s,
        r,
        "3",
        "auth.signIn",
        json!({ "uid": "admin", "password": "admin" }),
    );

    let generated = request_ok(s, r, "4", "notifications.generate", json!({}));
    assert_eq!(generated["generated"], 1);
    let items = generated["notifications"].as_array().expect("items");
    assert_eq!(items[0]["id"], "admin-approval_pending-1AP21CS050");
    assert_eq!(items[0]["type"], "approval_pending");

    // Another user never sees the admin's entries, and cannot mark them.
    request_ok(s, r, "5", "users.approve", json!({ "uid": "1AP21CS050" }));
    request_ok(s, r, "6", "auth.signOut", json!({}));
    request_ok(
        s,
        r,
        "7",
        "auth.signIn",
        json!({ "uid": "1AP21CS050", "password": "pw" }),
    );
    let listed = request_ok(s, r, "8", "notifications.list", json!({}));
    assert_eq!(listed["notifications"].as_array().expect("items").len(), 0);
    assert_eq!(
        request_err(
            s,
            r,
            "9",
            "notifications.markRead",
            json!({ "id": "admin-approval_pending-1AP21CS050" })
        ),
        "not_found"
    );

    let _ = child.kill();
}
