//! Batched multi-document assignment writes.
//!
//! One assignment touches three independent views: every student in the
//! batch, the faculty member's course list and teaching map, and the
//! course-side section record. All three are written in one op list; the
//! store splits oversized lists into sequential transactions, so the report
//! carries per-batch outcomes instead of pretending cross-batch atomicity.

use crate::db::{self, BatchOutcome, WriteOp};
use crate::paths;
use crate::reader;
use anyhow::bail;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct AssignRequest {
    pub department: String,
    pub year: String,
    pub section: String,
    /// Year-semester token (e.g. `III_5`); selects the newer layout when set.
    pub semester: Option<String>,
    pub course_id: String,
    pub faculty_id: String,
    /// Empty means the whole resolved roster.
    pub student_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignReport {
    pub assigned_students: usize,
    pub teaching_key: String,
    pub section_course_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_section_path: Option<String>,
    pub batches: Vec<BatchOutcome>,
    /// True when some but not all batches committed. Committed batches are
    /// never rolled back; the operator reconciles manually.
    pub partial: bool,
}

pub fn assign(conn: &mut Connection, req: &AssignRequest) -> anyhow::Result<AssignReport> {
    let section = req.section.trim().to_uppercase();
    if req.department.trim().is_empty()
        || req.year.trim().is_empty()
        || section.is_empty()
        || req.course_id.trim().is_empty()
        || req.faculty_id.trim().is_empty()
    {
        bail!("department, year, section, courseId and facultyId are required");
    }

    let roster = reader::best_roster(conn, &req.department, &req.year, &section)?;
    let student_ids: Vec<String> = if req.student_ids.is_empty() {
        roster.iter().map(|s| s.id.clone()).collect()
    } else {
        req.student_ids.clone()
    };
    if student_ids.is_empty() {
        bail!(
            "no students to assign for {}/{}/{}",
            req.department,
            req.year,
            section
        );
    }

    let known_paths: HashMap<&str, &str> = roster
        .iter()
        .map(|s| (s.id.as_str(), s.path.as_str()))
        .collect();
    let course_meta = reader::best_course_set(
        conn,
        &req.department,
        &req.year,
        req.semester.as_deref(),
    )?
    .into_iter()
    .find(|c| c.id == req.course_id);

    let ids_json: Vec<Value> = student_ids.iter().map(|id| json!(id)).collect();
    let mut ops: Vec<WriteOp> = Vec::new();

    // Student side: keep whatever path each record already lives at; only
    // brand-new students get a resolver-built path.
    for sid in &student_ids {
        let path = known_paths
            .get(sid.as_str())
            .map(|p| p.to_string())
            .unwrap_or_else(|| paths::student_doc_path(&req.department, &req.year, &section, sid));
        ops.push(WriteOp::ArrayUnion {
            path,
            field: "courses".to_string(),
            values: vec![json!(req.course_id)],
        });
    }

    // Faculty side: course list grows by union, the teaching entry for this
    // cohort is replaced outright so re-assignment cannot accumulate stale
    // member ids.
    let teaching_key = paths::teaching_key(&req.year, &section);
    let faculty_path = format!("faculty/{}/members/{}", req.department, req.faculty_id);
    ops.push(WriteOp::ArrayUnion {
        path: faculty_path.clone(),
        field: "courses".to_string(),
        values: vec![json!(req.course_id)],
    });
    let mut teaching = serde_json::Map::new();
    teaching.insert(teaching_key.clone(), Value::Array(ids_json.clone()));
    ops.push(WriteOp::SetMerge {
        path: faculty_path,
        data: json!({ "teaching": teaching }),
    });

    // Course side: section-scoped view plus a back-pointer to the master
    // record so later deletion is unambiguous.
    let section_course_path = match req.semester.as_deref() {
        Some(year_sem) => {
            paths::course_doc_path_year_sem(&req.department, year_sem, &req.course_id)
        }
        None => paths::course_doc_path(&req.department, &req.year, &section, &req.course_id),
    };
    let master_path: Option<String> = course_meta
        .as_ref()
        .map(|c| c.path.clone())
        .or_else(|| {
            req.semester.as_deref().map(|year_sem| {
                paths::course_doc_path_year_sem(&req.department, year_sem, &req.course_id)
            })
        });

    let mut students_by_section = serde_json::Map::new();
    students_by_section.insert(section.clone(), Value::Array(ids_json.clone()));
    let mut section_doc = json!({
        "instructor": req.faculty_id,
        "studentsBySection": students_by_section,
        "masterCoursePath": master_path.clone(),
    });
    if let Some(meta) = &course_meta {
        if let Some(code) = &meta.code {
            section_doc["courseCode"] = json!(code);
        }
        if let Some(title) = &meta.title {
            section_doc["courseName"] = json!(title);
        }
    }
    ops.push(WriteOp::SetMerge {
        path: section_course_path.clone(),
        data: section_doc,
    });
    // Retire the legacy flat student list on the section doc. Ordered after
    // the SetMerge so the document exists.
    ops.push(WriteOp::DeleteField {
        path: section_course_path.clone(),
        field: "students".to_string(),
    });

    let master_section_path = master_path
        .as_ref()
        .map(|m| format!("{}/sections/{}", m, section));
    if let Some(master_section) = &master_section_path {
        ops.push(WriteOp::SetMerge {
            path: master_section.clone(),
            data: json!({
                "instructor": req.faculty_id,
                "students": ids_json,
                "department": req.department,
                "year": req.year,
                "section": section,
                "semesterKey": req.semester,
            }),
        });
    }

    let total_batches = (ops.len() + db::MAX_BATCH_OPS - 1) / db::MAX_BATCH_OPS;
    let batches = db::commit(conn, &ops);
    let committed = batches.iter().filter(|b| b.committed).count();
    if committed == 0 {
        let reason = batches
            .iter()
            .find_map(|b| b.error.clone())
            .unwrap_or_else(|| "unknown error".to_string());
        bail!("assignment write failed: {}", reason);
    }

    Ok(AssignReport {
        assigned_students: student_ids.len(),
        teaching_key,
        section_course_path,
        master_section_path,
        batches,
        partial: committed < total_batches,
    })
}
