use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
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

fn login(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    username: &str,
    password: &str,
) {
    let _ = request_ok(
        stdin,
        reader,
        id,
        "session.login",
        json!({ "username": username, "password": password }),
    );
}

/// Admin `head`, teachers `alee` (5A) and `bkim`, students Ann and Ben in 5A.
fn seed_school(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, workspace: &Path) {
    let _ = request_ok(
        stdin,
        reader,
        "seed1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed2",
        "session.bootstrapAdmin",
        json!({ "name": "Head", "contact": "100", "username": "head", "password": "pw" }),
    );
    login(stdin, reader, "seed3", "head", "pw");
    for (id, name, username) in [("seed4", "A. Lee", "alee"), ("seed5", "B. Kim", "bkim")] {
        let _ = request_ok(
            stdin,
            reader,
            id,
            "employees.create",
            json!({
                "name": name,
                "contact": "200",
                "position": "teacher",
                "username": username,
                "password": "t"
            }),
        );
    }
    let _ = request_ok(
        stdin,
        reader,
        "seed6",
        "students.create",
        json!({ "name": "Ann", "age": 10, "classId": "5A" }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed7",
        "students.create",
        json!({ "name": "Ben", "age": 11, "classId": "5A", "marks": 70 }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed8",
        "schedules.assign",
        json!({ "classId": "5A", "teacherId": 2, "subject": "Science" }),
    );
    let _ = request_ok(stdin, reader, "seed9", "session.logout", json!({}));
}

#[test]
fn teacher_marks_attendance_and_reads_reports() {
    let workspace = temp_dir("schoold-teacher-attendance");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    seed_school(&mut stdin, &mut reader, &workspace);
    login(&mut stdin, &mut reader, "1", "alee", "t");

    let mine = request_ok(&mut stdin, &mut reader, "2", "schedules.mine", json!({}));
    assert_eq!(
        mine.pointer("/schedules/0/classId").and_then(|v| v.as_str()),
        Some("5A")
    );
    let admin_only = request(&mut stdin, &mut reader, "3", "employees.list", json!({}));
    assert_eq!(error_code(&admin_only), Some("forbidden"));

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.mark",
        json!({ "classId": "5A", "studentId": 1, "date": "2024-03-04", "status": "present" }),
    );
    assert_eq!(first.get("attendanceId").and_then(|v| v.as_u64()), Some(1));
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.mark",
        json!({ "classId": "5A", "studentId": 2, "date": "2024-03-04", "status": "Absent" }),
    );
    assert_eq!(second.get("attendanceId").and_then(|v| v.as_u64()), Some(2));
    let unassigned = request(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.mark",
        json!({ "classId": "6B", "studentId": 1, "date": "2024-03-04", "status": "present" }),
    );
    assert_eq!(error_code(&unassigned), Some("forbidden"));
    let bad_status = request(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.mark",
        json!({ "classId": "5A", "studentId": 1, "date": "2024-03-04", "status": "late" }),
    );
    assert_eq!(error_code(&bad_status), Some("bad_params"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "marks.update",
        json!({ "studentId": 1, "marks": 90 }),
    );
    let too_high = request(
        &mut stdin,
        &mut reader,
        "9",
        "marks.update",
        json!({ "studentId": 1, "marks": 120 }),
    );
    assert_eq!(error_code(&too_high), Some("bad_params"));
    let absent = request(
        &mut stdin,
        &mut reader,
        "10",
        "marks.update",
        json!({ "studentId": 99, "marks": 50 }),
    );
    assert_eq!(error_code(&absent), Some("not_found"));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "attendance.list",
        json!({ "classId": "5A" }),
    );
    assert_eq!(
        listed.get("attendance").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    let day = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "reports.attendance",
        json!({ "classId": "5A", "date": "2024-03-04" }),
    );
    assert_eq!(day.get("found").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        day.pointer("/rows/0/studentName").and_then(|v| v.as_str()),
        Some("Ann")
    );
    assert_eq!(
        day.pointer("/rows/1/status").and_then(|v| v.as_str()),
        Some("absent")
    );
    let empty_day = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "reports.attendance",
        json!({ "classId": "5A", "date": "2024-03-05" }),
    );
    assert_eq!(empty_day.get("found").and_then(|v| v.as_bool()), Some(false));

    let analysis = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "reports.analysis",
        json!({ "classId": "5A" }),
    );
    assert_eq!(
        analysis.pointer("/attendance/records").and_then(|v| v.as_u64()),
        Some(2)
    );
    assert_eq!(
        analysis.pointer("/attendance/presentRate").and_then(|v| v.as_f64()),
        Some(0.5)
    );
    let rate_sd = analysis
        .pointer("/attendance/presentRateStdDev")
        .and_then(|v| v.as_f64())
        .expect("rate std dev");
    assert!((rate_sd - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
    assert_eq!(
        analysis.pointer("/marks/mean").and_then(|v| v.as_f64()),
        Some(80.0)
    );
    let marks_sd = analysis
        .pointer("/marks/stdDev")
        .and_then(|v| v.as_f64())
        .expect("marks std dev");
    assert!((marks_sd - 200f64.sqrt()).abs() < 1e-9);
    assert!(analysis.get("error").is_none());

    let empty_class = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "reports.analysis",
        json!({ "classId": "9Z" }),
    );
    assert_eq!(
        empty_class.pointer("/marks/count").and_then(|v| v.as_u64()),
        Some(0)
    );
    assert_eq!(
        empty_class.pointer("/attendance/presentRate").and_then(|v| v.as_f64()),
        Some(0.0)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn lesson_plans_and_profile_stay_with_their_teacher() {
    let workspace = temp_dir("schoold-teacher-lessons");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    seed_school(&mut stdin, &mut reader, &workspace);
    login(&mut stdin, &mut reader, "1", "alee", "t");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lessons.create",
        json!({
            "classId": "5A",
            "subject": "Science",
            "details": "Plant cells",
            "date": "2024-03-05"
        }),
    );
    assert_eq!(created.get("lessonId").and_then(|v| v.as_u64()), Some(1));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.update",
        json!({ "lessonId": 1, "patch": { "objectives": "Label a cell", "date": null } }),
    );
    let mine = request_ok(&mut stdin, &mut reader, "4", "lessons.list", json!({}));
    assert_eq!(
        mine.pointer("/lessons/0/objectives").and_then(|v| v.as_str()),
        Some("Label a cell")
    );
    assert!(mine
        .pointer("/lessons/0/date")
        .map_or(false, |v| v.is_null()));
    assert_eq!(
        mine.pointer("/lessons/0/details").and_then(|v| v.as_str()),
        Some("Plant cells")
    );

    let profile = request_ok(&mut stdin, &mut reader, "5", "profile.get", json!({}));
    assert_eq!(
        profile.pointer("/profile/username").and_then(|v| v.as_str()),
        Some("alee")
    );
    assert!(profile.pointer("/profile/password").is_none());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "profile.update",
        json!({ "patch": { "contact": "999", "username": "amy.lee" } }),
    );
    let who = request_ok(&mut stdin, &mut reader, "7", "session.whoami", json!({}));
    assert_eq!(who.get("username").and_then(|v| v.as_str()), Some("amy.lee"));
    let promote = request(
        &mut stdin,
        &mut reader,
        "8",
        "profile.update",
        json!({ "patch": { "position": "admin" } }),
    );
    assert_eq!(error_code(&promote), Some("bad_params"));
    let _ = request_ok(&mut stdin, &mut reader, "9", "session.logout", json!({}));

    login(&mut stdin, &mut reader, "10", "bkim", "t");
    let theirs = request_ok(&mut stdin, &mut reader, "11", "lessons.list", json!({}));
    assert_eq!(
        theirs.get("lessons").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
    let foreign_update = request(
        &mut stdin,
        &mut reader,
        "12",
        "lessons.update",
        json!({ "lessonId": 1, "patch": { "subject": "Art" } }),
    );
    assert_eq!(error_code(&foreign_update), Some("not_found"));
    let foreign_delete = request(
        &mut stdin,
        &mut reader,
        "13",
        "lessons.delete",
        json!({ "lessonId": 1 }),
    );
    assert_eq!(error_code(&foreign_delete), Some("not_found"));
    let _ = request_ok(&mut stdin, &mut reader, "14", "session.logout", json!({}));

    login(&mut stdin, &mut reader, "15", "amy.lee", "t");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "lessons.delete",
        json!({ "lessonId": 1 }),
    );
    let none_left = request_ok(&mut stdin, &mut reader, "17", "lessons.list", json!({}));
    assert_eq!(
        none_left.get("lessons").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    let plans =
        std::fs::read_to_string(workspace.join("csv").join("lesson_plans.csv")).expect("plans csv");
    assert_eq!(
        plans.lines().next(),
        Some("lesson_id,teacher_id,class_id,subject,details,date,objectives,assessment")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
