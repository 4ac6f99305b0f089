use crate::ipc::helpers::{
    admin, bound, opt_str, opt_u32, parse_mark, patch_object, patch_string, patch_u32, required_id,
    required_str, respond, teacher, unknown_patch_field, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{Student, StudentDraft, StudentPatch};
use serde_json::json;
use std::path::PathBuf;

fn student_to_json(s: &Student) -> serde_json::Value {
    json!({
        "studentId": s.student_id,
        "name": s.name,
        "age": s.age,
        "classId": s.class_id,
        "marks": s.marks,
    })
}

fn students_list(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = opt_str(params, "classId")?;
    let b = bound(state)?;
    let rows: Vec<serde_json::Value> = b
        .store()
        .students()
        .iter()
        .filter(|s| class_id.as_deref().map_or(true, |c| s.class_id == c))
        .map(student_to_json)
        .collect();
    Ok(json!({ "students": rows }))
}

fn students_create(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = required_str(params, "name")?;
    let age = opt_u32(params, "age")?.ok_or_else(|| HandlerErr::bad_params("missing age"))?;
    let class_id = required_str(params, "classId")?;
    let marks = match params.get("marks") {
        None => None,
        Some(v) => parse_mark(v, "marks")?,
    };
    let mut admin = admin(state)?;
    let student_id = admin.add_student(StudentDraft {
        name,
        age,
        class_id,
        marks,
    })?;
    Ok(json!({ "studentId": student_id }))
}

fn students_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_id(params, "studentId")?;
    let mut patch = StudentPatch::default();
    for (k, v) in patch_object(params)? {
        match k.as_str() {
            "name" => patch.name = Some(patch_string(k, v)?),
            "age" => patch.age = Some(patch_u32(k, v)?),
            "classId" => {
                let c = patch_string(k, v)?;
                if c.is_empty() {
                    return Err(HandlerErr::bad_params("patch.classId must not be empty"));
                }
                patch.class_id = Some(c);
            }
            "marks" => patch.marks = Some(parse_mark(v, "patch.marks")?),
            _ => return Err(unknown_patch_field(k)),
        }
    }
    let mut admin = admin(state)?;
    if !admin.update_student(student_id, patch)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(json!({ "ok": true }))
}

fn students_delete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_id(params, "studentId")?;
    let mut admin = admin(state)?;
    admin.remove_student(student_id)?;
    Ok(json!({ "ok": true }))
}

/// Accepts either a file on disk (`path`) or the CSV text itself (`csv`).
fn students_import(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let path = opt_str(params, "path")?.map(PathBuf::from);
    let text = params.get("csv").and_then(|v| v.as_str()).map(str::to_string);
    let mut admin = admin(state)?;
    let ids = match (path, text) {
        (Some(path), None) => admin.import_students_from_path(&path)?,
        (None, Some(text)) => admin.import_students(text.as_bytes())?,
        _ => return Err(HandlerErr::bad_params("provide exactly one of path or csv")),
    };
    Ok(json!({ "imported": ids.len(), "studentIds": ids }))
}

fn marks_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_id(params, "studentId")?;
    let mark = params
        .get("marks")
        .ok_or_else(|| HandlerErr::bad_params("missing marks"))
        .and_then(|v| parse_mark(v, "marks"))?;
    let mut teacher = teacher(state)?;
    if !teacher.update_student_mark(student_id, mark)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "students.list" => students_list(state, &req.params),
        "students.create" => students_create(state, &req.params),
        "students.update" => students_update(state, &req.params),
        "students.delete" => students_delete(state, &req.params),
        "students.import" => students_import(state, &req.params),
        "marks.update" => marks_update(state, &req.params),
        _ => return None,
    };
    Some(respond(req, res))
}
