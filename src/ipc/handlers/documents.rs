//! Generic document operations. The surrounding CRUD screens (and the test
//! suite) seed and inspect the store through these; the relationship engine
//! itself goes through the typed handlers.

use crate::db::{self, WriteOp};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "documents.set" => Some(documents_set(state, req)),
        "documents.get" => Some(documents_get(state, req)),
        "documents.delete" => Some(documents_delete(state, req)),
        "collection.list" => Some(collection_list(state, req)),
        _ => None,
    }
}

fn documents_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let data = match req.params.get("data") {
        Some(v) if v.is_object() => v.clone(),
        _ => return err(&req.id, "bad_params", "missing object params.data", None),
    };
    let merge = req
        .params
        .get("merge")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    // Either a full document path, or a collection path with an optional id
    // (a fresh id is generated when omitted).
    let path = match req.params.get("path").and_then(|v| v.as_str()) {
        Some(p) => p.to_string(),
        None => {
            let Some(collection) = req.params.get("collection").and_then(|v| v.as_str()) else {
                return err(
                    &req.id,
                    "bad_params",
                    "missing params.path or params.collection",
                    None,
                );
            };
            let id = req
                .params
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            format!("{}/{}", collection, id)
        }
    };

    let op = if merge {
        WriteOp::SetMerge {
            path: path.clone(),
            data,
        }
    } else {
        WriteOp::Set {
            path: path.clone(),
            data,
        }
    };
    let outcomes = db::commit(conn, &[op]);
    if let Some(e) = outcomes.iter().find_map(|o| o.error.clone()) {
        return err(&req.id, "store_write_failed", e, None);
    }
    ok(&req.id, json!({ "path": path }))
}

fn documents_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(path) = req.params.get("path").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::get_doc(conn, path) {
        Ok(data) => ok(
            &req.id,
            json!({ "path": path, "exists": data.is_some(), "data": data }),
        ),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}

fn documents_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(path) = req.params.get("path").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let outcomes = db::commit(
        conn,
        &[WriteOp::DeleteDoc {
            path: path.to_string(),
        }],
    );
    if let Some(e) = outcomes.iter().find_map(|o| o.error.clone()) {
        return err(&req.id, "store_write_failed", e, None);
    }
    ok(&req.id, json!({ "path": path }))
}

fn collection_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(path) = req.params.get("path").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::list_collection(conn, path) {
        Ok(docs) => {
            let out: Vec<serde_json::Value> = docs
                .into_iter()
                .map(|d| json!({ "id": d.id, "path": d.path, "data": d.data }))
                .collect();
            ok(&req.id, json!({ "documents": out }))
        }
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}
