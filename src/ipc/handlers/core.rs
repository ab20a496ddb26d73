use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(ok(
            &req.id,
            json!({
                "version": env!("CARGO_PKG_VERSION"),
                "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
            }),
        )),
        "workspace.select" => {
            let Some(path) = req
                .params
                .get("path")
                .and_then(|v| v.as_str())
                .map(PathBuf::from)
            else {
                return Some(err(&req.id, "bad_params", "missing params.path", None));
            };

            match db::open_db(&path) {
                Ok(conn) => {
                    state.workspace = Some(path.clone());
                    state.db = Some(conn);
                    Some(ok(
                        &req.id,
                        json!({ "workspacePath": path.to_string_lossy() }),
                    ))
                }
                Err(e) => Some(err(&req.id, "db_open_failed", format!("{e:?}"), None)),
            }
        }
        _ => None,
    }
}
