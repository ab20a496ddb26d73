//! Canonical record shapes for data coming from either schema generation.
//!
//! Raw documents use whichever field names the importer of the day chose;
//! the alias chains below are ordered by how trustworthy each source proved
//! to be.

use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

/// Records with no usable section land in an explicit bucket instead of being
/// silently merged into another section's roster.
pub const UNASSIGNED_SECTION: &str = "UNASSIGNED";

const ROLL_ALIASES: &[&str] = &[
    "rollNo",
    "rollno",
    "RollNo",
    "Roll",
    "roll",
    "regNo",
    "RegNo",
    "registrationNo",
    "registrationNumber",
    "admissionNo",
    "hallTicket",
    "hallticket",
    "searchableRollNo",
    "searchableRollno",
    "studentId",
    "student_id",
];

const NAME_ALIASES: &[&str] = &[
    "studentName",
    "name",
    "fullName",
    "full_name",
    "displayName",
    "student_name",
    "shortName",
    "searchableName",
];

const SECTION_ALIASES: &[&str] = &["section", "Section", "sectionName", "sec"];

const COURSE_CODE_ALIASES: &[&str] = &["courseCode", "code", "course_code", "courseCODE"];
const COURSE_TITLE_ALIASES: &[&str] = &["courseName", "title", "name", "course_name"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub path: String,
    pub roll_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub section: String,
    pub course_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
}

fn first_nonempty(data: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        data.get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn joined_name(data: &Value, first_key: &str, last_key: &str) -> Option<String> {
    let first = data.get(first_key)?.as_str()?.trim();
    let last = data.get(last_key)?.as_str()?.trim();
    if first.is_empty() || last.is_empty() {
        return None;
    }
    Some(format!("{} {}", first, last))
}

pub fn normalize_student(raw: &Value, id: &str, path: &str) -> Student {
    let roll_no = first_nonempty(raw, ROLL_ALIASES).unwrap_or_else(|| id.to_string());
    let name = first_nonempty(raw, NAME_ALIASES)
        .or_else(|| joined_name(raw, "firstName", "lastName"))
        .or_else(|| joined_name(raw, "first_name", "last_name"));
    let section = first_nonempty(raw, SECTION_ALIASES)
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| UNASSIGNED_SECTION.to_string());
    let course_ids = raw
        .get("courses")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Student {
        id: id.to_string(),
        path: path.to_string(),
        roll_no,
        name,
        section,
        course_ids,
    }
}

pub fn normalize_course(raw: &Value, id: &str, path: &str) -> Course {
    Course {
        id: id.to_string(),
        path: path.to_string(),
        code: first_nonempty(raw, COURSE_CODE_ALIASES),
        title: first_nonempty(raw, COURSE_TITLE_ALIASES),
        instructor: first_nonempty(raw, &["instructor"]),
    }
}

/// Natural ordering by roll number, ties broken by id. Digit runs compare by
/// numeric value so `21A2` sorts before `21A10`.
pub fn compare_by_roll(a: &Student, b: &Student) -> Ordering {
    natural_cmp(&a.roll_no, &b.roll_no).then_with(|| natural_cmp(&a.id, &b.id))
}

pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let av: Vec<char> = a.chars().collect();
    let bv: Vec<char> = b.chars().collect();
    let (mut i, mut j) = (0usize, 0usize);

    while i < av.len() && j < bv.len() {
        let (ca, cb) = (av[i], bv[j]);
        if ca.is_ascii_digit() && cb.is_ascii_digit() {
            let si = i;
            while i < av.len() && av[i].is_ascii_digit() {
                i += 1;
            }
            let sj = j;
            while j < bv.len() && bv[j].is_ascii_digit() {
                j += 1;
            }
            let da: String = av[si..i].iter().skip_while(|c| **c == '0').collect();
            let db: String = bv[sj..j].iter().skip_while(|c| **c == '0').collect();
            let ord = da.len().cmp(&db.len()).then_with(|| da.cmp(&db));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = ca
                .to_ascii_lowercase()
                .cmp(&cb.to_ascii_lowercase());
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }
    (av.len() - i).cmp(&(bv.len() - j))
}
