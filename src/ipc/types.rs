use std::path::PathBuf;

use crate::records::Role;
use crate::store::RecordStore;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Who is logged in. Re-resolved against the store on every request.
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub role: Role,
    pub employee_id: u64,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<RecordStore>,
    pub session: Option<Session>,
}
