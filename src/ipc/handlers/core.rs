use crate::ipc::helpers::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "loggedIn": state.session.is_some()
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match store::open_workspace(&path) {
        Ok(store) => {
            info!(workspace = %path.to_string_lossy(), "workspace selected");
            state.workspace = Some(path.clone());
            state.store = Some(store);
            // A session belongs to the records it was checked against.
            state.session = None;
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "workspace open failed");
            err(&req.id, "store_failed", format!("{e:#}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
