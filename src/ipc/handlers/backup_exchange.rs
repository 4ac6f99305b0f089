use crate::backup;
use crate::ipc::helpers::{admin, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

fn path_param(req: &Request) -> Option<PathBuf> {
    req.params
        .get("path")
        .and_then(|v| v.as_str())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn handle_backup_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = admin(state) {
        return e.response(&req.id);
    }
    let Some(out) = path_param(req) else {
        return err(&req.id, "bad_params", "missing path", None);
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let export = match backup::export_workspace_bundle(&workspace_path, &out) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "backup export failed");
            return err(
                &req.id,
                "backup_failed",
                format!("{e:#}"),
                Some(json!({ "path": out.to_string_lossy() })),
            );
        }
    };
    info!(path = %out.to_string_lossy(), "backup exported");

    ok(
        &req.id,
        json!({
            "path": out.to_string_lossy(),
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count
        }),
    )
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = admin(state) {
        return e.response(&req.id);
    }
    let Some(src) = path_param(req) else {
        return err(&req.id, "bad_params", "missing path", None);
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": src.to_string_lossy() })),
        );
    }

    let restore = backup::import_workspace_bundle(&src, &workspace_path, |table, bytes| {
        store::check_table(table, bytes).map_err(anyhow::Error::from)
    });
    let import = match restore {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "backup import failed");
            return err(
                &req.id,
                "backup_failed",
                format!("{e:#}"),
                Some(json!({ "path": src.to_string_lossy() })),
            );
        }
    };

    // The tables on disk changed underneath the loaded store.
    match store::open_workspace(&workspace_path) {
        Ok(reloaded) => {
            state.store = Some(reloaded);
            info!(
                path = %src.to_string_lossy(),
                tables = import.tables_restored,
                "backup imported"
            );
            ok(
                &req.id,
                json!({
                    "bundleFormatDetected": import.bundle_format_detected,
                    "tablesRestored": import.tables_restored
                }),
            )
        }
        Err(e) => {
            state.store = None;
            state.session = None;
            warn!(error = %format!("{e:#}"), "reload after backup import failed");
            err(&req.id, "store_failed", format!("{e:#}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_backup_export(state, req)),
        "backup.import" => Some(handle_backup_import(state, req)),
        _ => None,
    }
}
