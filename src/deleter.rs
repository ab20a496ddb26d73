//! Cascading removal of an assignment from all three denormalized views.
//!
//! Every step is best-effort and independent: a failed path attempt is
//! recorded and skipped, never fatal to the whole unassignment. The course
//! side branches on which schema layout owns the course document; an
//! unrecognized layout gets a defensive reset instead of a delete so shared
//! data is never destroyed.

use crate::db::{self, WriteOp};
use crate::paths;
use anyhow::bail;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct UnassignRequest {
    pub course_id: String,
    pub course_doc_path: String,
    pub department: String,
    pub year: String,
    pub section: String,
    pub faculty_id: String,
    pub faculty_doc_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseAction {
    DeletedSectionDoc,
    DeletedMasterSection,
    Reset,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignReport {
    pub faculty_paths_updated: usize,
    pub students_updated: usize,
    pub course_action: CourseAction,
    pub failed_paths: Vec<String>,
}

pub fn unassign(conn: &mut Connection, req: &UnassignRequest) -> anyhow::Result<UnassignReport> {
    let section = req.section.trim().to_uppercase();
    if req.course_id.trim().is_empty() || req.course_doc_path.trim().is_empty() {
        bail!("courseId and courseDocPath are required");
    }

    let mut failed_paths: Vec<String> = Vec::new();
    let teaching_key = paths::teaching_key(&req.year, &section);

    // Faculty side: every plausible faculty location, independently.
    let mut faculty_paths: Vec<String> = Vec::new();
    if let Some(p) = &req.faculty_doc_path {
        faculty_paths.push(p.clone());
    }
    if !req.department.trim().is_empty() && !req.faculty_id.trim().is_empty() {
        let reconstructed = format!("faculty/{}/members/{}", req.department, req.faculty_id);
        if !faculty_paths.contains(&reconstructed) {
            faculty_paths.push(reconstructed);
        }
    }

    let mut faculty_paths_updated = 0usize;
    for fp in &faculty_paths {
        match remove_course_from_faculty(conn, fp, &req.course_id, &teaching_key) {
            Ok(true) => faculty_paths_updated += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("faculty cleanup failed at {}: {}", fp, e);
                failed_paths.push(fp.clone());
            }
        }
    }

    // Student side: the department-scoped roster first, then the legacy
    // unscoped layout, continuing past individual failures.
    let roman = paths::roman_year(&req.year);
    let mut students_updated = 0usize;
    let rosters = [
        paths::students_collection_path(&req.department, &roman, &section),
        format!("students/{}/{}", roman, section),
    ];
    for roster in &rosters {
        let docs = match db::list_collection(conn, roster) {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!("roster listing failed at {}: {}", roster, e);
                failed_paths.push(roster.clone());
                continue;
            }
        };
        for doc in docs {
            let outcomes = db::commit(
                conn,
                &[WriteOp::ArrayRemove {
                    path: doc.path.clone(),
                    field: "courses".to_string(),
                    values: vec![json!(req.course_id)],
                }],
            );
            if outcomes.iter().all(|o| o.committed) {
                students_updated += 1;
            } else {
                failed_paths.push(doc.path);
            }
        }
    }

    // Course side: branch on the owning layout parsed from the storage path.
    let seg: Vec<&str> = req.course_doc_path.split('/').collect();
    let variant = seg.get(2).copied().unwrap_or("");
    let (ops, course_action) = match variant {
        "years" => {
            let path_section = seg.get(5).copied().unwrap_or("");
            if !path_section.is_empty() && path_section != paths::ALL_SECTIONS {
                // Already a section-specific course doc: delete it outright.
                (
                    vec![WriteOp::DeleteDoc {
                        path: req.course_doc_path.clone(),
                    }],
                    CourseAction::DeletedSectionDoc,
                )
            } else {
                (
                    vec![WriteOp::DeleteDoc {
                        path: format!("{}/sections/{}", req.course_doc_path, section),
                    }],
                    CourseAction::DeletedMasterSection,
                )
            }
        }
        "year_sem" => (
            vec![WriteOp::DeleteDoc {
                path: format!("{}/sections/{}", req.course_doc_path, section),
            }],
            CourseAction::DeletedMasterSection,
        ),
        _ => (
            // Unknown layout: clear the linkage fields, keep the document.
            vec![WriteOp::SetMerge {
                path: req.course_doc_path.clone(),
                data: json!({ "instructor": null, "students": [] }),
            }],
            CourseAction::Reset,
        ),
    };
    let outcomes = db::commit(conn, &ops);
    if !outcomes.iter().all(|o| o.committed) {
        failed_paths.push(req.course_doc_path.clone());
    }

    Ok(UnassignReport {
        faculty_paths_updated,
        students_updated,
        course_action,
        failed_paths,
    })
}

/// Returns Ok(true) when the faculty doc existed and was rewritten.
fn remove_course_from_faculty(
    conn: &mut Connection,
    faculty_path: &str,
    course_id: &str,
    teaching_key: &str,
) -> anyhow::Result<bool> {
    let Some(data) = db::get_doc(conn, faculty_path)? else {
        return Ok(false);
    };
    let remaining: Vec<Value> = data
        .get("courses")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter(|v| v.as_str() != Some(course_id))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let ops = vec![
        WriteOp::SetMerge {
            path: faculty_path.to_string(),
            data: json!({ "courses": remaining }),
        },
        WriteOp::DeleteField {
            path: faculty_path.to_string(),
            field: format!("teaching.{}", teaching_key),
        },
    ];
    let outcomes = db::commit(conn, &ops);
    if let Some(err) = outcomes.iter().find_map(|o| o.error.clone()) {
        bail!(err);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{self, AssignRequest};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_store(prefix: &str) -> Connection {
        let p: PathBuf = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        db::open_db(&p).expect("open store")
    }

    fn seed(conn: &mut Connection, path: &str, data: Value) {
        let outcomes = db::commit(
            conn,
            &[WriteOp::Set {
                path: path.to_string(),
                data,
            }],
        );
        assert!(outcomes.iter().all(|o| o.committed), "seed {}", path);
    }

    fn assign_section(conn: &mut Connection, section: &str, students: &[&str]) {
        for sid in students {
            seed(
                conn,
                &paths::student_doc_path("CSE_DS", "III", section, sid),
                json!({ "rollNo": format!("R-{}", sid) }),
            );
        }
        let req = AssignRequest {
            department: "CSE_DS".into(),
            year: "III".into(),
            section: section.into(),
            semester: None,
            course_id: "c3".into(),
            faculty_id: "f9".into(),
            student_ids: students.iter().map(|s| s.to_string()).collect(),
        };
        writer::assign(conn, &req).expect("assign");
    }

    #[test]
    fn unassign_removes_all_three_views() {
        let mut conn = temp_store("enrolld-deleter-cascade");
        seed(
            &mut conn,
            "courses/CSE_DS/years/III/sections/ALL_SECTIONS/courseDetails/c3",
            json!({ "courseCode": "CS301" }),
        );
        assign_section(&mut conn, "B", &["s1", "s2"]);

        let report = unassign(
            &mut conn,
            &UnassignRequest {
                course_id: "c3".into(),
                course_doc_path: "courses/CSE_DS/years/III/sections/B/courseDetails/c3".into(),
                department: "CSE_DS".into(),
                year: "III".into(),
                section: "B".into(),
                faculty_id: "f9".into(),
                faculty_doc_path: None,
            },
        )
        .expect("unassign");

        assert!(report.failed_paths.is_empty());
        assert_eq!(report.course_action, CourseAction::DeletedSectionDoc);
        assert_eq!(report.faculty_paths_updated, 1);
        assert_eq!(report.students_updated, 2);

        let student = db::get_doc(&conn, "students/CSE_DS/B-III/s1")
            .expect("get")
            .expect("student doc");
        assert_eq!(student["courses"], json!([]));

        let faculty = db::get_doc(&conn, "faculty/CSE_DS/members/f9")
            .expect("get")
            .expect("faculty doc");
        assert_eq!(faculty["courses"], json!([]));
        assert!(faculty["teaching"].get("III_B").is_none());

        assert!(db::get_doc(
            &conn,
            "courses/CSE_DS/years/III/sections/B/courseDetails/c3"
        )
        .expect("get")
        .is_none());
    }

    #[test]
    fn master_section_delete_leaves_sibling_sections_intact() {
        let mut conn = temp_store("enrolld-deleter-master");
        let master = "courses/CSE_DS/years/III/sections/ALL_SECTIONS/courseDetails/c3";
        seed(&mut conn, master, json!({ "courseCode": "CS301" }));
        assign_section(&mut conn, "A", &["a1"]);
        assign_section(&mut conn, "B", &["b1"]);

        let report = unassign(
            &mut conn,
            &UnassignRequest {
                course_id: "c3".into(),
                course_doc_path: master.into(),
                department: "CSE_DS".into(),
                year: "III".into(),
                section: "B".into(),
                faculty_id: "f9".into(),
                faculty_doc_path: None,
            },
        )
        .expect("unassign");

        assert_eq!(report.course_action, CourseAction::DeletedMasterSection);
        assert!(db::get_doc(&conn, &format!("{}/sections/B", master))
            .expect("get")
            .is_none());
        // Section A's sub-record and the master itself survive.
        let section_a = db::get_doc(&conn, &format!("{}/sections/A", master))
            .expect("get")
            .expect("section A subdoc");
        assert_eq!(section_a["students"], json!(["a1"]));
        assert!(db::get_doc(&conn, master).expect("get").is_some());
    }

    #[test]
    fn unknown_layout_resets_instead_of_deleting() {
        let mut conn = temp_store("enrolld-deleter-reset");
        let odd_path = "courses/CSE_DS/archive/2019/courseDetails/c3";
        seed(
            &mut conn,
            odd_path,
            json!({ "instructor": "f9", "students": ["s1"], "courseCode": "CS301" }),
        );

        let report = unassign(
            &mut conn,
            &UnassignRequest {
                course_id: "c3".into(),
                course_doc_path: odd_path.into(),
                department: "CSE_DS".into(),
                year: "III".into(),
                section: "B".into(),
                faculty_id: "f9".into(),
                faculty_doc_path: None,
            },
        )
        .expect("unassign");

        assert_eq!(report.course_action, CourseAction::Reset);
        let doc = db::get_doc(&conn, odd_path).expect("get").expect("doc");
        assert_eq!(doc["instructor"], json!(null));
        assert_eq!(doc["students"], json!([]));
        // Shared metadata untouched.
        assert_eq!(doc["courseCode"], json!("CS301"));
    }

    #[test]
    fn legacy_roster_is_also_swept() {
        let mut conn = temp_store("enrolld-deleter-legacy");
        seed(
            &mut conn,
            "students/III/B/s1",
            json!({ "rollNo": "21A1", "courses": ["c3", "c4"] }),
        );

        let report = unassign(
            &mut conn,
            &UnassignRequest {
                course_id: "c3".into(),
                course_doc_path: "courses/CSE_DS/years/III/sections/B/courseDetails/c3".into(),
                department: "CSE_DS".into(),
                year: "III_5".into(),
                section: "B".into(),
                faculty_id: "f9".into(),
                faculty_doc_path: None,
            },
        )
        .expect("unassign");

        assert_eq!(report.students_updated, 1);
        let doc = db::get_doc(&conn, "students/III/B/s1")
            .expect("get")
            .expect("doc");
        assert_eq!(doc["courses"], json!(["c4"]));
    }
}
