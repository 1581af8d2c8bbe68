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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_schooldeskd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schooldeskd");
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
fn announcement_post_list_delete() {
    let workspace = temp_dir("schooldesk-announcements");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "announcements.create",
        json!({
            "title": "Enrollment Week",
            "body": "Enrollment for incoming Grade 11 runs June 1-5.",
            "audience": "students"
        }),
    );
    let announcement_id = created["announcementId"]
        .as_str()
        .expect("announcementId")
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "announcements.create",
        json!({
            "title": "Faculty Meeting",
            "body": "All teachers report to the AVR on Friday."
        }),
    );

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "announcements.list",
        json!({}),
    );
    let announcements = listed["announcements"].as_array().cloned().unwrap_or_default();
    assert_eq!(announcements.len(), 2);
    // Default audience applies when none is given.
    assert!(announcements
        .iter()
        .any(|a| a["audience"].as_str() == Some("all")));
    assert!(announcements
        .iter()
        .all(|a| a["postedAt"].as_str().is_some()));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "announcements.delete",
        json!({ "announcementId": announcement_id }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "announcements.list",
        json!({}),
    );
    assert_eq!(
        listed["announcements"].as_array().map(|a| a.len()),
        Some(1)
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "7",
        "announcements.delete",
        json!({ "announcementId": announcement_id }),
    );
    assert_eq!(
        resp["error"].get("code").and_then(|v| v.as_str()),
        Some("not_found")
    );
}

#[test]
fn announcement_requires_title_and_body() {
    let workspace = temp_dir("schooldesk-announcements-req");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "announcements.create",
        json!({ "title": "  " }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        resp["error"].get("code").and_then(|v| v.as_str()),
        Some("bad_params")
    );
}
