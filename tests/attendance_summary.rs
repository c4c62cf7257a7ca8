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

fn register_and_approve_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    uid: &str,
    email: &str,
) {
    request_ok(
        stdin,
        reader,
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
    request_ok(stdin, reader, "appr", "users.approve", json!({ "uid": uid }));
}

#[test]
fn subject_summary_counts_and_percentage() {
    let workspace = temp_dir("apsconnect-attendance");
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
    register_and_approve_student(s, r, "1AP21CS001", "s1@example.edu");
    register_and_approve_student(s, r, "1AP21CS002", "s2@example.edu");

    let subject = request_ok(
        s,
        r,
        "3",
        "subjects.create",
        json!({
            "code": "DS",
            "name": "Data Structures",
            "branch": "CSE",
            "semester": 5,
        }),
    );
    let subject_id = subject["subject"]["id"].as_str().expect("subject id").to_string();

    // Three marked days: S1 present, present, absent.
    for (day, date, s1, s2) in [
        ("4", "2026-08-03", "present", "absent"),
        ("5", "2026-08-04", "present", "present"),
        ("6", "2026-08-05", "absent", "present"),
    ] {
        let marked = request_ok(
            s,
            r,
            day,
            "attendance.mark",
            json!({
                "subjectId": subject_id,
                "date": date,
                "entries": [
                    { "studentUid": "1AP21CS001", "status": s1 },
                    { "studentUid": "1AP21CS002", "status": s2 },
                ],
            }),
        );
        assert_eq!(marked["marked"], 2);
    }

    let summary = request_ok(
        s,
        r,
        "7",
        "attendance.studentSummary",
        json!({ "studentUid": "1AP21CS001" }),
    );
    let subjects = summary["subjects"].as_array().expect("subjects");
    assert_eq!(subjects.len(), 1);
    assert_eq!(subjects[0]["subjectCode"], "DS");
    assert_eq!(subjects[0]["present"], 2);
    assert_eq!(subjects[0]["total"], 3);
    assert_eq!(subjects[0]["percentage"], 67);
    assert_eq!(summary["overall"]["percentage"], 67);

    // Re-marking the same day upserts instead of adding a fourth row.
    request_ok(
        s,
        r,
        "8",
        "attendance.mark",
        json!({
            "subjectId": subject_id,
            "date": "2026-08-05",
            "entries": [{ "studentUid": "1AP21CS001", "status": "present" }],
        }),
    );
    let summary = request_ok(
        s,
        r,
        "9",
        "attendance.studentSummary",
        json!({ "studentUid": "1AP21CS001" }),
    );
    assert_eq!(summary["subjects"][0]["total"], 3);
    assert_eq!(summary["subjects"][0]["present"], 3);
    assert_eq!(summary["subjects"][0]["percentage"], 100);

    // Unknown uids in a batch are skipped, not fatal.
    let marked = request_ok(
        s,
        r,
        "10",
        "attendance.mark",
        json!({
            "subjectId": subject_id,
            "date": "2026-08-06",
            "entries": [
                { "studentUid": "1AP21CS001", "status": "present" },
                { "studentUid": "ghost", "status": "present" },
            ],
        }),
    );
    assert_eq!(marked["marked"], 1);

    let branch = request_ok(
        s,
        r,
        "11",
        "attendance.branchSummary",
        json!({ "branch": "CSE", "semester": 5 }),
    );
    let students = branch["students"].as_array().expect("students");
    assert_eq!(students.len(), 2);
    assert_eq!(students[0]["studentUid"], "1AP21CS001");
    assert_eq!(students[0]["present"], 4);
    assert_eq!(students[0]["total"], 4);
    assert_eq!(students[1]["studentUid"], "1AP21CS002");
    assert_eq!(students[1]["percentage"], 67);

    assert_eq!(
        request_err(
            s,
            r,
            "12",
            "attendance.mark",
            json!({
                "subjectId": subject_id,
                "date": "05-08-2026",
                "entries": [],
            })
        ),
        "bad_params"
    );

    let _ = child.kill();
}

#[test]
fn students_only_see_their_own_summary() {
    let workspace = temp_dir("apsconnect-attendance-scope");
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
    register_and_approve_student(s, r, "1AP21CS001", "s1@example.edu");
    register_and_approve_student(s, r, "1AP21CS002", "s2@example.edu");
    request_ok(s, r, "3", "auth.signOut", json!({}));

    request_ok(
        s,
        r,
        "4",
        "auth.signIn",
        json!({ "uid": "1AP21CS001", "password": "pw" }),
    );
    // Defaults to the signed-in student; an empty record set is a 0, not an error.
    let own = request_ok(s, r, "5", "attendance.studentSummary", json!({}));
    assert_eq!(own["studentUid"], "1AP21CS001");
    assert_eq!(own["overall"]["percentage"], 0);

    assert_eq!(
        request_err(
            s,
            r,
            "6",
            "attendance.studentSummary",
            json!({ "studentUid": "1AP21CS002" })
        ),
        "forbidden"
    );

    let _ = child.kill();
}
