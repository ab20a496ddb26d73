//! Storage-path builders for the department/year/section document layouts.
//!
//! Two schema generations coexist in stored data: an older year-based layout
//! (`courses/{dept}/years/{year}/sections/{section|ALL_SECTIONS}/...`) and a
//! newer year-semester layout (`courses/{dept}/year_sem/{YY_S}/...`). Student
//! rosters additionally appear under both `SECTION-YEAR` and `YEAR-SECTION`
//! group keys and under both underscored and compacted department keys, so
//! read paths are enumerated rather than assumed. Everything here is a pure
//! function of its inputs.

use serde::Serialize;
use std::collections::HashSet;

pub const ALL_SECTIONS: &str = "ALL_SECTIONS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterPath {
    pub path: String,
    pub legacy: bool,
}

/// Uppercase, underscore-safe department key; unknown input maps to "UNK".
pub fn normalize_department_key(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return "UNK".to_string();
    }
    trimmed
        .to_uppercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Ordered department key variants: normalized first, then the compacted
/// (underscore-stripped) form historical data also used.
pub fn department_variants(label: &str) -> Vec<String> {
    let normalized = normalize_department_key(label);
    let compact: String = normalized.chars().filter(|c| *c != '_').collect();
    let mut out = vec![normalized];
    if !compact.is_empty() && !out.contains(&compact) {
        out.push(compact);
    }
    out
}

fn up_or_u(token: &str) -> String {
    let t = token.trim();
    if t.is_empty() {
        "U".to_string()
    } else {
        t.to_uppercase()
    }
}

/// Current roster group key: `SECTION-YEAR` (e.g. `B-III`).
pub fn roster_group_key(year: &str, section: &str) -> String {
    format!("{}-{}", up_or_u(section), up_or_u(year))
}

/// Both orderings seen in stored data, current one first.
pub fn roster_group_key_variants(year: &str, section: &str) -> Vec<String> {
    let y = up_or_u(year);
    let s = up_or_u(section);
    vec![format!("{}-{}", s, y), format!("{}-{}", y, s)]
}

pub fn students_collection_path(department: &str, year: &str, section: &str) -> String {
    format!(
        "students/{}/{}",
        normalize_department_key(department),
        roster_group_key(year, section)
    )
}

pub fn student_doc_path(department: &str, year: &str, section: &str, student_id: &str) -> String {
    format!(
        "{}/{}",
        students_collection_path(department, year, section),
        student_id
    )
}

/// Every structurally plausible roster location, ordered by priority and
/// deduplicated: the primary path, then each (department variant x group-key
/// variant) combination, then the pre-department legacy path last. The legacy
/// path is only consulted when every scoped candidate comes back empty.
pub fn candidate_roster_paths(department: &str, year: &str, section: &str) -> Vec<RosterPath> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<RosterPath> = Vec::new();

    let mut push = |path: String, legacy: bool, out: &mut Vec<RosterPath>| {
        if seen.insert(path.clone()) {
            out.push(RosterPath { path, legacy });
        }
    };

    push(
        students_collection_path(department, year, section),
        false,
        &mut out,
    );
    for dept in department_variants(department) {
        for key in roster_group_key_variants(year, section) {
            push(format!("students/{}/{}", dept, key), false, &mut out);
        }
    }
    push(
        format!("students/{}/{}", up_or_u(year), up_or_u(section)),
        true,
        &mut out,
    );

    out
}

/// Years layout container. Department codes pass through unchanged; course
/// data was written with the short code as-is.
pub fn courses_collection_path(department: &str, year: &str, section: &str) -> String {
    format!(
        "courses/{}/years/{}/sections/{}/courseDetails",
        department,
        up_or_u(year),
        up_or_u(section)
    )
}

pub fn course_doc_path(department: &str, year: &str, section: &str, course_id: &str) -> String {
    format!(
        "{}/{}",
        courses_collection_path(department, year, section),
        course_id
    )
}

/// Year-semester layout container, keyed by tokens like `III_5`.
pub fn courses_collection_path_year_sem(department: &str, year_sem: &str) -> String {
    format!(
        "courses/{}/year_sem/{}/courseDetails",
        department,
        up_or_u(year_sem)
    )
}

pub fn course_doc_path_year_sem(department: &str, year_sem: &str, course_id: &str) -> String {
    format!(
        "{}/{}",
        courses_collection_path_year_sem(department, year_sem),
        course_id
    )
}

pub fn semester_keys_for_year(year: &str) -> Vec<&'static str> {
    match year.trim().to_uppercase().as_str() {
        "I" => vec!["I_1", "I_2"],
        "II" => vec!["II_3", "II_4"],
        "III" => vec!["III_5", "III_6"],
        "IV" => vec!["IV_7", "IV_8"],
        _ => Vec::new(),
    }
}

/// Roman base of a year token: `III_5` and `III` both map to `III`.
pub fn roman_year(year: &str) -> String {
    year.split('_').next().unwrap_or("").trim().to_uppercase()
}

/// Composite key indexing a faculty member's per-cohort student list.
pub fn teaching_key(year: &str, section: &str) -> String {
    format!("{}_{}", roman_year(year), section.trim().to_uppercase())
}
