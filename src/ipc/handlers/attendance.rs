use crate::ipc::helpers::{
    bound, opt_date, opt_str, required_date, required_id, required_str, respond, teacher,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{AttendanceRecord, AttendanceStatus};
use serde_json::json;

fn record_to_json(a: &AttendanceRecord) -> serde_json::Value {
    json!({
        "attendanceId": a.attendance_id,
        "classId": a.class_id,
        "studentId": a.student_id,
        "date": a.date,
        "status": a.status.as_str(),
    })
}

fn attendance_list(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = opt_str(params, "classId")?;
    let date = opt_date(params, "date")?;
    let b = bound(state)?;
    let rows: Vec<serde_json::Value> = b
        .store()
        .attendance()
        .iter()
        .filter(|a| class_id.as_deref().map_or(true, |c| a.class_id == c))
        .filter(|a| date.map_or(true, |d| a.date == d))
        .map(record_to_json)
        .collect();
    Ok(json!({ "attendance": rows }))
}

fn attendance_mark(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let student_id = required_id(params, "studentId")?;
    let date = required_date(params, "date")?;
    let raw = required_str(params, "status")?;
    let status = AttendanceStatus::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params("status must be present or absent"))?;
    let mut teacher = teacher(state)?;
    let Some(attendance_id) = teacher.mark_attendance(&class_id, student_id, date, status)? else {
        return Err(HandlerErr::new(
            "forbidden",
            format!("class {} is not assigned to you", class_id),
        ));
    };
    Ok(json!({ "attendanceId": attendance_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "attendance.list" => attendance_list(state, &req.params),
        "attendance.mark" => attendance_mark(state, &req.params),
        _ => return None,
    };
    Some(respond(req, res))
}
