use crate::ipc::helpers::{bound, required_date, required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// `found: false` with no rows when nothing was marked for that class and day.
fn attendance_report(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let date = required_date(params, "date")?;
    let b = bound(state)?;
    let result = match b.attendance_report(&class_id, date) {
        Some(rows) => json!({ "found": true, "rows": rows }),
        None => json!({ "found": false, "rows": [] }),
    };
    Ok(result)
}

fn analysis_report(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let b = bound(state)?;
    let report = b.analysis_report(&class_id);
    serde_json::to_value(report)
        .map_err(|e| HandlerErr::new("store_failed", format!("serialize report: {}", e)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "reports.attendance" => attendance_report(state, &req.params),
        "reports.analysis" => analysis_report(state, &req.params),
        _ => return None,
    };
    Some(respond(req, res))
}
