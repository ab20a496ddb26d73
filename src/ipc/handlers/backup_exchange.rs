use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(export_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(import_bundle(state, req)),
        _ => None,
    }
}

fn export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let workspace = req
        .params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone());
    let Some(workspace) = workspace else {
        return err(
            &req.id,
            "bad_params",
            "missing params.workspacePath and no workspace selected",
            None,
        );
    };
    let Some(out_path) = req
        .params
        .get("outPath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return err(&req.id, "bad_params", "missing params.outPath", None);
    };

    match backup::export_workspace_bundle(&workspace, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "entryCount": summary.entry_count,
                "outPath": out_path.to_string_lossy(),
            }),
        ),
        Err(e) => err(&req.id, "bad_bundle", e.to_string(), None),
    }
}

fn import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = req
        .params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return err(&req.id, "bad_params", "missing params.workspacePath", None);
    };
    let Some(in_path) = req
        .params
        .get("inPath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return err(&req.id, "bad_params", "missing params.inPath", None);
    };

    // The import replaces the database file underneath any open connection.
    if state.workspace.as_deref() == Some(workspace.as_path()) {
        state.db = None;
    }

    match backup::import_workspace_bundle(&in_path, &workspace) {
        Ok(summary) => {
            if state.workspace.as_deref() == Some(workspace.as_path()) {
                match db::open_db(&workspace) {
                    Ok(conn) => state.db = Some(conn),
                    Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
                }
            }
            ok(
                &req.id,
                json!({ "bundleFormatDetected": summary.bundle_format_detected }),
            )
        }
        Err(e) => err(&req.id, "bad_bundle", e.to_string(), None),
    }
}
