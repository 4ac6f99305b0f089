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
    let exe = env!("CARGO_BIN_EXE_schoold");
    let mut child = Command::new(exe)
        .env_remove("SCHOOLD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoold");
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

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value.pointer("/error/code").and_then(|v| v.as_str())
}

#[test]
fn requests_are_gated_by_workspace_and_session() {
    let workspace = temp_dir("schoold-session-gates");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("workspacePath").map_or(false, |v| v.is_null()));
    assert_eq!(health.get("loggedIn").and_then(|v| v.as_bool()), Some(false));

    let early = request(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(error_code(&early), Some("no_workspace"));
    let early_login = request(
        &mut stdin,
        &mut reader,
        "3",
        "session.login",
        json!({ "username": "head", "password": "pw" }),
    );
    assert_eq!(error_code(&early_login), Some("no_workspace"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    for table in ["employees", "students", "attendance", "schedules", "lesson_plans"] {
        assert!(
            workspace.join("csv").join(format!("{}.csv", table)).is_file(),
            "{} table created",
            table
        );
    }

    let anonymous = request(&mut stdin, &mut reader, "5", "students.list", json!({}));
    assert_eq!(error_code(&anonymous), Some("not_logged_in"));
    let who = request(&mut stdin, &mut reader, "6", "session.whoami", json!({}));
    assert_eq!(error_code(&who), Some("not_logged_in"));

    let missing = request(
        &mut stdin,
        &mut reader,
        "7",
        "session.bootstrapAdmin",
        json!({ "name": "Head", "contact": "100", "username": "head" }),
    );
    assert_eq!(error_code(&missing), Some("bad_params"));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "session.bootstrapAdmin",
        json!({ "name": "Head", "contact": "100", "username": "head", "password": "pw" }),
    );
    let again = request(
        &mut stdin,
        &mut reader,
        "9",
        "session.bootstrapAdmin",
        json!({ "name": "Other", "contact": "1", "username": "other", "password": "x" }),
    );
    assert_eq!(error_code(&again), Some("forbidden"));

    let wrong = request(
        &mut stdin,
        &mut reader,
        "10",
        "session.login",
        json!({ "username": "head", "password": "nope" }),
    );
    assert_eq!(error_code(&wrong), Some("login_failed"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "session.login",
        json!({ "username": "head", "password": "pw" }),
    );
    let who = request_ok(&mut stdin, &mut reader, "12", "session.whoami", json!({}));
    assert_eq!(who.get("role").and_then(|v| v.as_str()), Some("admin"));
    assert_eq!(who.get("employeeId").and_then(|v| v.as_u64()), Some(1));

    // Staff rows never carry credentials, so they cannot log in.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "employees.create",
        json!({
            "name": "Sam",
            "contact": "300",
            "position": "janitor",
            "username": "sam",
            "password": "s"
        }),
    );
    let staff_login = request(
        &mut stdin,
        &mut reader,
        "14",
        "session.login",
        json!({ "username": "sam", "password": "s" }),
    );
    assert_eq!(error_code(&staff_login), Some("login_failed"));

    // A failed login leaves the current session in place.
    let teacher_only = request(&mut stdin, &mut reader, "15", "lessons.list", json!({}));
    assert_eq!(error_code(&teacher_only), Some("forbidden"));

    let bad_id = request(
        &mut stdin,
        &mut reader,
        "16",
        "students.delete",
        json!({ "studentId": "abc" }),
    );
    assert_eq!(error_code(&bad_id), Some("bad_params"));
    let unknown_field = request(
        &mut stdin,
        &mut reader,
        "17",
        "students.update",
        json!({ "studentId": 1, "patch": { "shoeSize": 9 } }),
    );
    assert_eq!(error_code(&unknown_field), Some("bad_params"));

    let unknown = request(&mut stdin, &mut reader, "18", "grades.explode", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    let _ = request_ok(&mut stdin, &mut reader, "19", "session.logout", json!({}));
    let health = request_ok(&mut stdin, &mut reader, "20", "health", json!({}));
    assert_eq!(health.get("loggedIn").and_then(|v| v.as_bool()), Some(false));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn malformed_lines_get_bad_json_and_the_loop_continues() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(error_code(&value), Some("bad_json"));

    let _ = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));

    drop(stdin);
    let _ = child.wait();
}
