use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::paths;
use crate::reader;
use serde_json::json;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "rosters.candidates" => Some(roster_candidates(req)),
        "rosters.best" => Some(roster_best(state, req)),
        "courses.best" => Some(courses_best(state, req)),
        _ => None,
    }
}

fn batch_params(req: &Request) -> Result<(String, String, String), serde_json::Value> {
    let department = req
        .params
        .get("department")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let year = req
        .params
        .get("year")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let section = req
        .params
        .get("section")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    if department.is_empty() || year.is_empty() || section.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            "department, year and section are required",
            None,
        ));
    }
    Ok((department, year, section))
}

fn roster_candidates(req: &Request) -> serde_json::Value {
    let (department, year, section) = match batch_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let candidates = paths::candidate_roster_paths(&department, &year, &section);
    ok(&req.id, json!({ "candidates": candidates }))
}

fn roster_best(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let (department, year, section) = match batch_params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match reader::best_roster(conn, &department, &year, &section) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}

fn courses_best(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let department = req
        .params
        .get("department")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let year = req.params.get("year").and_then(|v| v.as_str()).unwrap_or("");
    if department.is_empty() || year.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "department and year are required",
            None,
        );
    }
    let semester = req.params.get("semester").and_then(|v| v.as_str());

    match reader::best_course_set(conn, department, year, semester) {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}
