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

#[test]
fn disabled_preference_gates_generation() {
    let workspace = temp_dir("apsconnect-prefs");
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
    request_ok(
        s,
        r,
        "5",
        "fees.upsert",
        json!({
            "studentUid": "1AP21CS001",
            "title": "Bus fee",
            "amount": 800.0,
            "dueDate": days_from_today(5),
        }),
    );
    let subject = request_ok(
        s,
        r,
        "6",
        "subjects.create",
        json!({ "code": "OS", "name": "Operating Systems", "branch": "CSE", "semester": 5 }),
    );
    let subject_id = subject["subject"]["id"].as_str().expect("subject id").to_string();
    request_ok(
        s,
        r,
        "7",
        "attendance.mark",
        json!({
            "subjectId": subject_id,
            "date": "2026-08-03",
            "entries": [{ "studentUid": "1AP21CS001", "status": "absent" }],
        }),
    );
    request_ok(s, r, "8", "auth.signOut", json!({}));

    request_ok(
        s,
        r,
        "9",
        "auth.signIn",
        json!({ "uid": "1AP21CS001", "password": "pw" }),
    );

    // Defaults: everything enabled.
    let prefs = request_ok(s, r, "10", "notifications.prefs.get", json!({}));
    assert_eq!(prefs["preferences"]["feeDue"], true);
    assert_eq!(prefs["preferences"]["lowAttendance"], true);

    // Turn fee alerts off; the partial update leaves the other flags alone.
    let prefs = request_ok(
        s,
        r,
        "11",
        "notifications.prefs.set",
        json!({ "feeDue": false }),
    );
    assert_eq!(prefs["preferences"]["feeDue"], false);
    assert_eq!(prefs["preferences"]["lowAttendance"], true);

    let generated = request_ok(s, r, "12", "notifications.generate", json!({}));
    assert_eq!(generated["generated"], 1);
    let items = generated["notifications"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], "low_attendance");

    // Re-enable: the suppressed fee condition now materializes.
    request_ok(
        s,
        r,
        "13",
        "notifications.prefs.set",
        json!({ "feeDue": true }),
    );
    let generated = request_ok(s, r, "14", "notifications.generate", json!({}));
    assert_eq!(generated["generated"], 1);
    let types: Vec<&str> = generated["notifications"]
        .as_array()
        .expect("items")
        .iter()
        .filter_map(|n| n["type"].as_str())
        .collect();
    assert!(types.contains(&"fee_due"));
    assert!(types.contains(&"low_attendance"));

    let _ = child.kill();
}

#[test]
fn generation_for_one_user_leaks_nothing_to_another() {
    let workspace = temp_dir("apsconnect-prefs-isolation");
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
    for (uid, email) in [
        ("1AP21CS001", "s1@example.edu"),
        ("1AP21CS002", "s2@example.edu"),
    ] {
        request_ok(
            s,
            r,
            "reg",
            "auth.register",
            json!({
                "uid": uid,
                "name": format!("Student {uid}"),
                "email": email,
                "password": "pw",
                "role": "student",
                "branch": "CSE",
                "semester": 5,
            }),
        );
        request_ok(s, r, "appr", "users.approve", json!({ "uid": uid }));
    }
    // Only the first student owes anything.
    request_ok(
        s,
        r,
        "3",
        "fees.upsert",
        json!({
            "studentUid": "1AP21CS001",
            "title": "Hostel fee",
            "amount": 15000.0,
            "dueDate": days_from_today(7),
        }),
    );
    request_ok(s, r, "4", "auth.signOut", json!({}));

    request_ok(
        s,
        r,
        "5",
        "auth.signIn",
        json!({ "uid": "1AP21CS001", "password": "pw" }),
    );
    let generated = request_ok(s, r, "6", "notifications.generate", json!({}));
    assert_eq!(generated["generated"], 1);
    request_ok(s, r, "7", "auth.signOut", json!({}));

    request_ok(
        s,
        r,
        "8",
        "auth.signIn",
        json!({ "uid": "1AP21CS002", "password": "pw" }),
    );
    let generated = request_ok(s, r, "9", "notifications.generate", json!({}));
    assert_eq!(generated["generated"], 0);
    let listed = request_ok(s, r, "10", "notifications.list", json!({}));
    assert_eq!(listed["notifications"].as_array().expect("items").len(), 0);

    let _ = child.kill();
}
