use crate::calc::{AnalysisReport, AttendanceReportRow};
use crate::error::StoreError;
use crate::ipc::types::{AppState, Request, Session};
use crate::records::Role;
use crate::roles::{Admin, Teacher};
use crate::store::RecordStore;
use chrono::NaiveDate;
use serde_json::{json, Map, Value as JsonValue};
use tracing::warn;

pub fn ok(id: &str, result: JsonValue) -> JsonValue {
    json!({ "id": id, "ok": true, "result": result })
}

/// `details` is omitted from the envelope when absent.
pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<JsonValue>,
) -> JsonValue {
    let mut error = Map::new();
    error.insert("code".to_string(), json!(code));
    error.insert("message".to_string(), json!(message.into()));
    if let Some(d) = details {
        error.insert("details".to_string(), d);
    }
    json!({ "id": id, "ok": false, "error": error })
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<JsonValue>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr::new("bad_params", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HandlerErr::new("not_found", message)
    }

    pub fn response(self, id: &str) -> JsonValue {
        err(id, self.code, self.message, self.details)
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        // The io/csv cause is not part of the error's own message.
        let message = match std::error::Error::source(&e) {
            Some(cause) => format!("{}: {}", e, cause),
            None => e.to_string(),
        };
        warn!(error = %message, "store operation failed");
        match &e {
            StoreError::Import(_) => HandlerErr::new("import_failed", message),
            StoreError::Io { table, .. }
            | StoreError::Csv { table, .. }
            | StoreError::Corrupt { table, .. } => HandlerErr {
                code: "store_failed",
                message,
                details: Some(json!({ "table": table })),
            },
        }
    }
}

pub fn respond(req: &Request, res: Result<JsonValue, HandlerErr>) -> JsonValue {
    match res {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn required_str(params: &JsonValue, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Ids arrive as numbers or numeric strings straight from form fields.
pub fn required_id(params: &JsonValue, key: &str) -> Result<u64, HandlerErr> {
    let v = params
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    parse_id(v).ok_or_else(|| HandlerErr::bad_params(format!("{} must be a positive integer", key)))
}

pub fn parse_id(v: &JsonValue) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n).filter(|n| *n > 0);
    }
    v.as_str()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
}

pub fn opt_str(params: &JsonValue, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v
                .as_str()
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string or null", key)))?
                .trim()
                .to_string();
            Ok(Some(s).filter(|s| !s.is_empty()))
        }
    }
}

pub fn opt_u32(params: &JsonValue, key: &str) -> Result<Option<u32>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => to_u32(v)
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a whole number", key))),
    }
}

fn to_u32(v: &JsonValue) -> Option<u32> {
    if let Some(n) = v.as_u64() {
        return u32::try_from(n).ok();
    }
    v.as_str().and_then(|s| s.trim().parse::<u32>().ok())
}

pub fn parse_date(raw: &str, key: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn required_date(params: &JsonValue, key: &str) -> Result<NaiveDate, HandlerErr> {
    let raw = required_str(params, key)?;
    parse_date(&raw, key)
}

pub fn opt_date(params: &JsonValue, key: &str) -> Result<Option<NaiveDate>, HandlerErr> {
    match opt_str(params, key)? {
        None => Ok(None),
        Some(raw) => parse_date(&raw, key).map(Some),
    }
}

/// Marks are 0 to 100 inclusive; null clears.
pub fn parse_mark(v: &JsonValue, key: &str) -> Result<Option<f64>, HandlerErr> {
    if v.is_null() {
        return Ok(None);
    }
    let mark = match v.as_f64() {
        Some(n) => n,
        None => v
            .as_str()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number or null", key)))?,
    };
    if !mark.is_finite() || !(0.0..=100.0).contains(&mark) {
        return Err(HandlerErr::bad_params(format!(
            "{} must be between 0 and 100",
            key
        )));
    }
    Ok(Some(mark))
}

pub fn patch_object(params: &JsonValue) -> Result<&Map<String, JsonValue>, HandlerErr> {
    params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("missing patch"))
}

pub fn patch_string(key: &str, v: &JsonValue) -> Result<String, HandlerErr> {
    v.as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("patch.{} must be string", key)))
}

pub fn patch_nullable_string(key: &str, v: &JsonValue) -> Result<Option<String>, HandlerErr> {
    if v.is_null() {
        return Ok(None);
    }
    patch_string(key, v).map(|s| Some(s).filter(|s| !s.is_empty()))
}

pub fn patch_u32(key: &str, v: &JsonValue) -> Result<u32, HandlerErr> {
    to_u32(v).ok_or_else(|| HandlerErr::bad_params(format!("patch.{} must be a whole number", key)))
}

pub fn patch_nullable_u32(key: &str, v: &JsonValue) -> Result<Option<u32>, HandlerErr> {
    if v.is_null() {
        return Ok(None);
    }
    patch_u32(key, v).map(Some)
}

pub fn patch_nullable_date(key: &str, v: &JsonValue) -> Result<Option<NaiveDate>, HandlerErr> {
    match patch_nullable_string(key, v)? {
        None => Ok(None),
        Some(raw) => parse_date(&raw, &format!("patch.{}", key)).map(Some),
    }
}

pub fn unknown_patch_field(key: &str) -> HandlerErr {
    HandlerErr::bad_params(format!("unknown patch field: {}", key))
}

pub fn store_mut(state: &mut AppState) -> Result<&mut RecordStore, HandlerErr> {
    state
        .store
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn session(state: &AppState) -> Result<Session, HandlerErr> {
    if state.store.is_none() {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    }
    state
        .session
        .clone()
        .ok_or_else(|| HandlerErr::new("not_logged_in", "log in first"))
}

fn stale_session() -> HandlerErr {
    HandlerErr::new("not_logged_in", "session user no longer exists; log in again")
}

pub fn admin(state: &mut AppState) -> Result<Admin<'_>, HandlerErr> {
    let s = session(state)?;
    if s.role != Role::Admin {
        return Err(HandlerErr::new("forbidden", "admin only"));
    }
    Admin::bind(store_mut(state)?, &s.username).ok_or_else(stale_session)
}

pub fn teacher(state: &mut AppState) -> Result<Teacher<'_>, HandlerErr> {
    let s = session(state)?;
    if s.role != Role::Teacher {
        return Err(HandlerErr::new("forbidden", "teacher only"));
    }
    Teacher::bind(store_mut(state)?, &s.username).ok_or_else(stale_session)
}

/// Whichever façade matches the logged-in role.
pub enum Bound<'a> {
    Admin(Admin<'a>),
    Teacher(Teacher<'a>),
}

impl Bound<'_> {
    pub fn store(&self) -> &RecordStore {
        match self {
            Bound::Admin(a) => a.store(),
            Bound::Teacher(t) => t.store(),
        }
    }

    pub fn attendance_report(
        &self,
        class_id: &str,
        date: NaiveDate,
    ) -> Option<Vec<AttendanceReportRow>> {
        match self {
            Bound::Admin(a) => a.attendance_report(class_id, date),
            Bound::Teacher(t) => t.attendance_report(class_id, date),
        }
    }

    pub fn analysis_report(&self, class_id: &str) -> AnalysisReport {
        match self {
            Bound::Admin(a) => a.analysis_report(class_id),
            Bound::Teacher(t) => t.analysis_report(class_id),
        }
    }
}

pub fn bound(state: &mut AppState) -> Result<Bound<'_>, HandlerErr> {
    let s = session(state)?;
    let store = store_mut(state)?;
    match s.role {
        Role::Admin => Admin::bind(store, &s.username)
            .map(Bound::Admin)
            .ok_or_else(stale_session),
        Role::Teacher => Teacher::bind(store, &s.username)
            .map(Bound::Teacher)
            .ok_or_else(stale_session),
        Role::Staff => Err(HandlerErr::new("forbidden", "staff accounts cannot log in")),
    }
}
