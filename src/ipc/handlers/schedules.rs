use crate::ipc::helpers::{
    admin, opt_date, opt_str, opt_u32, parse_id, patch_nullable_string, patch_nullable_u32,
    patch_object, required_id, required_str, respond, teacher, unknown_patch_field, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{Schedule, ScheduleDraft, SchedulePatch};
use serde_json::json;

fn schedule_to_json(s: &Schedule) -> serde_json::Value {
    json!({
        "classId": s.class_id,
        "teacherId": s.teacher_id,
        "className": s.class_name,
        "date": s.date,
        "duration": s.duration,
        "maxStudents": s.max_students,
        "subject": s.subject,
    })
}

fn schedules_list(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let admin = admin(state)?;
    let rows: Vec<serde_json::Value> = admin
        .store()
        .schedules()
        .iter()
        .map(schedule_to_json)
        .collect();
    Ok(json!({ "schedules": rows }))
}

fn schedules_mine(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let teacher = teacher(state)?;
    let rows: Vec<serde_json::Value> = teacher
        .assigned_classes()
        .into_iter()
        .map(schedule_to_json)
        .collect();
    Ok(json!({ "schedules": rows }))
}

fn schedules_assign(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let draft = ScheduleDraft {
        class_id: required_str(params, "classId")?,
        teacher_id: required_id(params, "teacherId")?,
        date: opt_date(params, "date")?,
        class_name: opt_str(params, "className")?,
        duration: opt_u32(params, "duration")?,
        max_students: opt_u32(params, "maxStudents")?,
        subject: opt_str(params, "subject")?,
    };
    let mut admin = admin(state)?;
    if !admin.assign_teacher_to_class(draft)? {
        return Err(HandlerErr::not_found("teacher not found"));
    }
    Ok(json!({ "ok": true }))
}

fn schedules_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let date = opt_date(params, "date")?;
    let mut patch = SchedulePatch::default();
    for (k, v) in patch_object(params)? {
        match k.as_str() {
            "teacherId" => {
                let id = parse_id(v).ok_or_else(|| {
                    HandlerErr::bad_params("patch.teacherId must be a positive integer")
                })?;
                patch.teacher_id = Some(id);
            }
            "className" => patch.class_name = Some(patch_nullable_string(k, v)?),
            "duration" => patch.duration = Some(patch_nullable_u32(k, v)?),
            "maxStudents" => patch.max_students = Some(patch_nullable_u32(k, v)?),
            "subject" => patch.subject = Some(patch_nullable_string(k, v)?),
            // Part of the row key.
            "date" => {
                return Err(HandlerErr::bad_params(
                    "patch.date cannot change; delete and assign again",
                ))
            }
            _ => return Err(unknown_patch_field(k)),
        }
    }
    let mut admin = admin(state)?;
    if !admin.update_schedule(&class_id, date, patch)? {
        return Err(HandlerErr::not_found("schedule or teacher not found"));
    }
    Ok(json!({ "ok": true }))
}

fn schedules_delete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let date = opt_date(params, "date")?;
    let mut admin = admin(state)?;
    admin.remove_schedule(&class_id, date)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "schedules.list" => schedules_list(state),
        "schedules.mine" => schedules_mine(state),
        "schedules.assign" => schedules_assign(state, &req.params),
        "schedules.update" => schedules_update(state, &req.params),
        "schedules.delete" => schedules_delete(state, &req.params),
        _ => return None,
    };
    Some(respond(req, res))
}
