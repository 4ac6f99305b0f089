use crate::ipc::helpers::{
    opt_date, opt_str, patch_nullable_date, patch_object, patch_string, required_id,
    required_str, respond, teacher, unknown_patch_field, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{LessonPlan, LessonPlanDraft, LessonPlanPatch};
use serde_json::json;

fn lesson_to_json(l: &LessonPlan) -> serde_json::Value {
    json!({
        "lessonId": l.lesson_id,
        "teacherId": l.teacher_id,
        "classId": l.class_id,
        "subject": l.subject,
        "details": l.details,
        "date": l.date,
        "objectives": l.objectives,
        "assessment": l.assessment,
    })
}

fn lessons_list(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = opt_str(params, "classId")?;
    let teacher = teacher(state)?;
    let rows: Vec<serde_json::Value> = teacher
        .lesson_plans()
        .into_iter()
        .filter(|l| class_id.as_deref().map_or(true, |c| l.class_id == c))
        .map(lesson_to_json)
        .collect();
    Ok(json!({ "lessons": rows }))
}

fn lessons_create(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let draft = LessonPlanDraft {
        class_id: required_str(params, "classId")?,
        subject: required_str(params, "subject")?,
        details: opt_str(params, "details")?.unwrap_or_default(),
        date: opt_date(params, "date")?,
        objectives: opt_str(params, "objectives")?.unwrap_or_default(),
        assessment: opt_str(params, "assessment")?.unwrap_or_default(),
    };
    let mut teacher = teacher(state)?;
    let lesson_id = teacher.add_lesson_plan(draft)?;
    Ok(json!({ "lessonId": lesson_id }))
}

fn lessons_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let lesson_id = required_id(params, "lessonId")?;
    let mut patch = LessonPlanPatch::default();
    for (k, v) in patch_object(params)? {
        match k.as_str() {
            "classId" => {
                let c = patch_string(k, v)?;
                if c.is_empty() {
                    return Err(HandlerErr::bad_params("patch.classId must not be empty"));
                }
                patch.class_id = Some(c);
            }
            "subject" => patch.subject = Some(patch_string(k, v)?),
            "details" => patch.details = Some(patch_string(k, v)?),
            "date" => patch.date = Some(patch_nullable_date(k, v)?),
            "objectives" => patch.objectives = Some(patch_string(k, v)?),
            "assessment" => patch.assessment = Some(patch_string(k, v)?),
            _ => return Err(unknown_patch_field(k)),
        }
    }
    let mut teacher = teacher(state)?;
    if !teacher.update_lesson_plan(lesson_id, patch)? {
        return Err(HandlerErr::not_found("lesson plan not found"));
    }
    Ok(json!({ "ok": true }))
}

fn lessons_delete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let lesson_id = required_id(params, "lessonId")?;
    let mut teacher = teacher(state)?;
    if !teacher.remove_lesson_plan(lesson_id)? {
        return Err(HandlerErr::not_found("lesson plan not found"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "lessons.list" => lessons_list(state, &req.params),
        "lessons.create" => lessons_create(state, &req.params),
        "lessons.update" => lessons_update(state, &req.params),
        "lessons.delete" => lessons_delete(state, &req.params),
        _ => return None,
    };
    Some(respond(req, res))
}
