//! Scatter-gather reads across the coexisting schema layouts.
//!
//! Every candidate location is probed; non-empty results are scored by data
//! completeness and the single best answer wins. Probe failures are logged
//! and skipped; "nothing at this path" is an expected outcome, not an error.

use crate::db::{self, Doc};
use crate::normalize::{self, Course, Student};
use crate::paths;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// One record scores a point for carrying a roll number distinct from its
/// storage id and another for a non-empty display name.
fn roster_score(list: &[Student]) -> i64 {
    list.iter()
        .map(|s| {
            let mut score = 0i64;
            if s.roll_no != s.id {
                score += 1;
            }
            if s.name.is_some() {
                score += 1;
            }
            score
        })
        .sum()
}

fn normalize_docs(docs: &[Doc]) -> Vec<Student> {
    docs.iter()
        .map(|d| normalize::normalize_student(&d.data, &d.id, &d.path))
        .collect()
}

/// Best available roster for (department, year, section). Scoped variants are
/// probed in resolver order; strictly higher scores win and ties keep the
/// earlier candidate, so identical data always yields identical answers. The
/// legacy unscoped path is read only when every scoped variant is empty.
pub fn best_roster(
    conn: &Connection,
    department: &str,
    year: &str,
    section: &str,
) -> anyhow::Result<Vec<Student>> {
    let candidates = paths::candidate_roster_paths(department, year, section);
    let mut best: Option<(i64, Vec<Student>)> = None;

    for cand in candidates.iter().filter(|c| !c.legacy) {
        let docs = match db::list_collection(conn, &cand.path) {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!("roster probe failed at {}: {}", cand.path, e);
                continue;
            }
        };
        if docs.is_empty() {
            continue;
        }
        let list = normalize_docs(&docs);
        let score = roster_score(&list);
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, list));
        }
    }

    let mut roster = match best {
        Some((_, list)) => list,
        None => {
            let mut legacy_roster = Vec::new();
            for cand in candidates.iter().filter(|c| c.legacy) {
                match db::list_collection(conn, &cand.path) {
                    Ok(docs) => legacy_roster = normalize_docs(&docs),
                    Err(e) => {
                        tracing::warn!("legacy roster probe failed at {}: {}", cand.path, e)
                    }
                }
            }
            legacy_roster
        }
    };

    roster.sort_by(normalize::compare_by_roll);
    Ok(roster)
}

/// Course set for the selected container: the year-semester container when a
/// semester key is given, otherwise the years/ALL_SECTIONS master container.
/// When the direct read is empty the year's derived semester containers are
/// probed next, and only then the cross-collection scan filtered by path
/// tokens.
pub fn best_course_set(
    conn: &Connection,
    department: &str,
    year: &str,
    semester: Option<&str>,
) -> anyhow::Result<Vec<Course>> {
    let container = match semester {
        Some(year_sem) => paths::courses_collection_path_year_sem(department, year_sem),
        None => paths::courses_collection_path(department, year, paths::ALL_SECTIONS),
    };

    let docs = match db::list_collection(conn, &container) {
        Ok(docs) => docs,
        Err(e) => {
            tracing::warn!("course probe failed at {}: {}", container, e);
            Vec::new()
        }
    };
    let mut courses: Vec<Course> = docs
        .iter()
        .map(|d| normalize::normalize_course(&d.data, &d.id, &d.path))
        .collect();

    if courses.is_empty() && semester.is_none() {
        // Data may have moved to the newer layout without the caller knowing
        // a semester key; both semesters of the year are plausible.
        for key in paths::semester_keys_for_year(year) {
            let container = paths::courses_collection_path_year_sem(department, key);
            match db::list_collection(conn, &container) {
                Ok(docs) => courses.extend(
                    docs.iter()
                        .map(|d| normalize::normalize_course(&d.data, &d.id, &d.path)),
                ),
                Err(e) => tracing::warn!("course probe failed at {}: {}", container, e),
            }
        }
    }

    if courses.is_empty() {
        // Last resort: scan every courseDetails collection and keep documents
        // whose path parses to the requested department and year.
        for doc in db::collection_group(conn, "courseDetails")? {
            let seg: Vec<&str> = doc.path.split('/').collect();
            if seg.get(1).copied() == Some(department) && seg.get(3).copied() == Some(year) {
                courses.push(normalize::normalize_course(&doc.data, &doc.id, &doc.path));
            }
        }
    }

    Ok(courses)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub course_doc_path: String,
    pub department: String,
    pub year: String,
    pub section: String,
    pub course_code: String,
    pub course_name: String,
    pub faculty_id: String,
    pub faculty_name: String,
    pub faculty_designation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faculty_doc_path: Option<String>,
}

struct FacultyEntry {
    name: String,
    designation: String,
    path: String,
}

fn faculty_map(conn: &Connection) -> anyhow::Result<HashMap<String, FacultyEntry>> {
    let mut members = db::collection_group(conn, "members")?;
    if members.is_empty() {
        // Older data kept faculty in a flat top-level collection.
        members = db::list_collection(conn, "faculty")?;
    }
    let mut map = HashMap::new();
    for doc in members {
        let name = doc
            .data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let designation = doc
            .data
            .get("designation")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        map.insert(
            doc.id.clone(),
            FacultyEntry {
                name,
                designation,
                path: doc.path,
            },
        );
    }
    Ok(map)
}

/// Reconstructs every active (faculty, course, section) assignment from the
/// course-side view, across both layouts. Masters expand their per-section
/// sub-records; a years master with no sub-records falls back to a single
/// ALL_SECTIONS row. Courses with no instructor anywhere yield nothing.
pub fn list_assignments(conn: &Connection) -> anyhow::Result<Vec<Assignment>> {
    let faculty = faculty_map(conn)?;
    let mut assignments = Vec::new();

    for doc in db::collection_group(conn, "courseDetails")? {
        let seg: Vec<&str> = doc.path.split('/').collect();
        let department = seg.get(1).copied().unwrap_or("").to_string();
        let variant = seg.get(2).copied().unwrap_or("");
        let year = seg.get(3).copied().unwrap_or("").to_string();
        let course_id = if variant == "year_sem" {
            seg.get(5).copied().unwrap_or(doc.id.as_str()).to_string()
        } else {
            seg.get(7).copied().unwrap_or(doc.id.as_str()).to_string()
        };
        let meta = normalize::normalize_course(&doc.data, &doc.id, &doc.path);
        let base_instructor = meta.instructor.clone();

        let mut push = |section: &str, instructor_override: Option<String>| {
            let Some(faculty_id) = instructor_override.or_else(|| base_instructor.clone()) else {
                return;
            };
            let entry = faculty.get(&faculty_id);
            assignments.push(Assignment {
                id: course_id.clone(),
                course_doc_path: doc.path.clone(),
                department: department.clone(),
                year: year.clone(),
                section: section.to_string(),
                course_code: meta.code.clone().unwrap_or_default(),
                course_name: meta.title.clone().unwrap_or_default(),
                faculty_id: faculty_id.clone(),
                faculty_name: entry
                    .map(|e| e.name.clone())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
                faculty_designation: entry.map(|e| e.designation.clone()).unwrap_or_default(),
                faculty_doc_path: entry.map(|e| e.path.clone()),
            });
        };

        match variant {
            "years" => {
                let path_section = seg.get(5).copied().unwrap_or("");
                if !path_section.is_empty() && path_section != paths::ALL_SECTIONS {
                    push(path_section, None);
                } else {
                    let sections = db::list_collection(conn, &format!("{}/sections", doc.path))
                        .unwrap_or_else(|e| {
                            tracing::warn!("sections probe failed under {}: {}", doc.path, e);
                            Vec::new()
                        });
                    if sections.is_empty() {
                        push(paths::ALL_SECTIONS, None);
                    } else {
                        for sec in sections {
                            let overridden = sec
                                .data
                                .get("instructor")
                                .and_then(Value::as_str)
                                .map(str::to_string);
                            push(&sec.id, overridden);
                        }
                    }
                }
            }
            "year_sem" => {
                // No section in the path; the sections subcollection is the
                // only source. Masters without sub-records are skipped.
                let sections = db::list_collection(conn, &format!("{}/sections", doc.path))
                    .unwrap_or_else(|e| {
                        tracing::warn!("sections probe failed under {}: {}", doc.path, e);
                        Vec::new()
                    });
                for sec in sections {
                    let overridden = sec
                        .data
                        .get("instructor")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    push(&sec.id, overridden);
                }
            }
            _ => {}
        }
    }

    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::WriteOp;
    use serde_json::json;
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

    #[test]
    fn richer_variant_wins_the_roster_score() {
        let mut conn = temp_store("enrolld-reader-score");
        // Compact-department variant holds bare ids only.
        seed(&mut conn, "students/CSEDS/B-III/s1", json!({}));
        seed(&mut conn, "students/CSEDS/B-III/s2", json!({}));
        // Primary variant carries real roll numbers and names.
        seed(
            &mut conn,
            "students/CSE_DS/B-III/s1",
            json!({ "rollNo": "21A1", "studentName": "Asha" }),
        );

        let roster = best_roster(&conn, "CSE_DS", "III", "B").expect("roster");
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].roll_no, "21A1");
        assert_eq!(roster[0].path, "students/CSE_DS/B-III/s1");
    }

    #[test]
    fn score_ties_keep_the_higher_priority_candidate() {
        let mut conn = temp_store("enrolld-reader-tie");
        seed(
            &mut conn,
            "students/CSE_DS/B-III/s1",
            json!({ "rollNo": "21A1", "studentName": "Primary" }),
        );
        seed(
            &mut conn,
            "students/CSE_DS/III-B/s1",
            json!({ "rollNo": "21A1", "studentName": "Reversed" }),
        );

        let roster = best_roster(&conn, "CSE_DS", "III", "B").expect("roster");
        assert_eq!(roster[0].name.as_deref(), Some("Primary"));
    }

    #[test]
    fn legacy_path_is_used_only_when_all_scoped_variants_are_empty() {
        let mut conn = temp_store("enrolld-reader-legacy");
        seed(&mut conn, "students/II/A/s1", json!({ "rollNo": "21A1" }));

        let roster = best_roster(&conn, "CSE_DS", "II", "A").expect("roster");
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id, "s1");
        assert_eq!(roster[0].roll_no, "21A1");

        // Any scoped data, however sparse, shadows the legacy path.
        seed(&mut conn, "students/CSE_DS/A-II/x9", json!({}));
        let roster = best_roster(&conn, "CSE_DS", "II", "A").expect("roster");
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id, "x9");
    }

    #[test]
    fn course_lookup_probes_the_year_semester_containers() {
        let mut conn = temp_store("enrolld-reader-yearsem");
        seed(
            &mut conn,
            "courses/CSE_DS/year_sem/III_6/courseDetails/c5",
            json!({ "courseCode": "CS306" }),
        );

        // No semester key given and the years master is empty; the probe
        // derives III_5 and III_6 from the year.
        let courses = best_course_set(&conn, "CSE_DS", "III", None).expect("courses");
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].id, "c5");
    }

    #[test]
    fn course_lookup_falls_back_to_the_cross_collection_scan() {
        let mut conn = temp_store("enrolld-reader-scan");
        seed(
            &mut conn,
            "courses/CSE_DS/years/III/sections/A/courseDetails/c3",
            json!({ "courseCode": "CS301", "courseName": "Compilers" }),
        );
        seed(
            &mut conn,
            "courses/IT/years/III/sections/A/courseDetails/c9",
            json!({ "courseCode": "IT301" }),
        );

        // The ALL_SECTIONS master container is empty, so the scan kicks in
        // and filters by department/year parsed from each path.
        let courses = best_course_set(&conn, "CSE_DS", "III", None).expect("courses");
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].id, "c3");
        assert_eq!(courses[0].code.as_deref(), Some("CS301"));
    }
}
