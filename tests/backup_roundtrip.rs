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

#[test]
fn export_then_import_round_trips_the_workspace() {
    let workspace_a = temp_dir("apsconnect-backup-a");
    let workspace_b = temp_dir("apsconnect-backup-b");
    let bundle = temp_dir("apsconnect-backup-out").join("bundle.zip");
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    let s = &mut stdin;
    let r = &mut reader;

    request_ok(
        s,
        r,
        "1",
        "workspace.select",
        json!({ "path": workspace_a.to_string_lossy() }),
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

    let exported = request_ok(
        s,
        r,
        "5",
        "backup.export",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], "apsconnect-workspace-v1");
    let sha = exported["dbSha256"].as_str().expect("sha");
    assert_eq!(sha.len(), 64);
    assert!(bundle.is_file());

    // A fresh workspace, then the bundle lands on top of it.
    request_ok(
        s,
        r,
        "6",
        "workspace.select",
        json!({ "path": workspace_b.to_string_lossy() }),
    );
    request_ok(
        s,
        r,
        "7",
        "auth.signIn",
        json!({ "uid": "admin", "password": "admin" }),
    );
    let imported = request_ok(
        s,
        r,
        "8",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(imported["dbSha256"], sha);

    // The import dropped the session; the restored data is all there.
    assert_eq!(request_err(s, r, "9", "auth.me", json!({})), "not_signed_in");
    request_ok(
        s,
        r,
        "10",
        "auth.signIn",
        json!({ "uid": "1AP21CS001", "password": "pw" }),
    );
    let me = request_ok(s, r, "11", "auth.me", json!({}));
    assert_eq!(me["user"]["name"], "Asha Rao");

    let _ = child.kill();
}

#[test]
fn a_bad_bundle_leaves_the_workspace_intact() {
    let workspace = temp_dir("apsconnect-backup-bad");
    let junk = temp_dir("apsconnect-backup-junk").join("not-a-bundle.zip");
    std::fs::write(&junk, b"this is not a zip archive").expect("write junk");

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
    assert_eq!(
        request_err(
            s,
            r,
            "3",
            "backup.import",
            json!({ "inPath": junk.to_string_lossy() })
        ),
        "backup_failed"
    );

    // The original database survived the failed import.
    request_ok(
        s,
        r,
        "4",
        "auth.signIn",
        json!({ "uid": "admin", "password": "admin" }),
    );
    let health = request_ok(s, r, "5", "health", json!({}));
    assert_eq!(health["signedInUid"], "admin");

    let _ = child.kill();
}
