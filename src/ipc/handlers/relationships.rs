use crate::deleter::{self, UnassignRequest};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::reader;
use crate::writer::{self, AssignRequest};
use serde_json::json;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "relationships.assign" => Some(relationships_assign(state, req)),
        "relationships.unassign" => Some(relationships_unassign(state, req)),
        "assignments.list" => Some(assignments_list(state, req)),
        _ => None,
    }
}

fn str_param(req: &Request, key: &str) -> String {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn relationships_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let assign_req = AssignRequest {
        department: str_param(req, "department"),
        year: str_param(req, "year"),
        section: str_param(req, "section"),
        semester: req
            .params
            .get("semester")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        course_id: str_param(req, "courseId"),
        faculty_id: str_param(req, "facultyId"),
        student_ids: req
            .params
            .get("studentIds")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    if assign_req.department.is_empty()
        || assign_req.year.is_empty()
        || assign_req.section.is_empty()
        || assign_req.course_id.is_empty()
        || assign_req.faculty_id.is_empty()
    {
        return err(
            &req.id,
            "bad_params",
            "department, year, section, courseId and facultyId are required",
            None,
        );
    }

    match writer::assign(conn, &assign_req) {
        Ok(report) => ok(&req.id, json!(report)),
        Err(e) => err(&req.id, "store_write_failed", e.to_string(), None),
    }
}

fn relationships_unassign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let unassign_req = UnassignRequest {
        course_id: str_param(req, "courseId"),
        course_doc_path: str_param(req, "courseDocPath"),
        department: str_param(req, "department"),
        year: str_param(req, "year"),
        section: str_param(req, "section"),
        faculty_id: str_param(req, "facultyId"),
        faculty_doc_path: req
            .params
            .get("facultyDocPath")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
    };

    if unassign_req.course_id.is_empty()
        || unassign_req.course_doc_path.is_empty()
        || unassign_req.section.is_empty()
    {
        return err(
            &req.id,
            "bad_params",
            "courseId, courseDocPath and section are required",
            None,
        );
    }

    match deleter::unassign(conn, &unassign_req) {
        Ok(report) => ok(&req.id, json!(report)),
        Err(e) => err(&req.id, "store_write_failed", e.to_string(), None),
    }
}

fn assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match reader::list_assignments(conn) {
        Ok(assignments) => ok(&req.id, json!({ "assignments": assignments })),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}
