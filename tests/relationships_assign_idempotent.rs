
use serde_json::json;
use test_support::{get_doc, request_ok, seed_doc, spawn_sidecar, temp_dir};

#[test]
fn running_the_same_assignment_twice_changes_nothing() {
    let workspace = temp_dir("enrolld-assign-idem");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    seed_doc(
        &mut stdin,
        &mut reader,
        "2",
        "students/CSE_DS/B-III/s1",
        json!({ "rollNo": "21A1", "studentName": "Asha" }),
    );
    seed_doc(
        &mut stdin,
        &mut reader,
        "3",
        "students/CSE_DS/B-III/s2",
        json!({ "rollNo": "21A2", "studentName": "Bharat" }),
    );
    seed_doc(
        &mut stdin,
        &mut reader,
        "4",
        "courses/CSE_DS/years/III/sections/ALL_SECTIONS/courseDetails/c3",
        json!({ "courseCode": "CS301", "courseName": "Compilers" }),
    );

    let assign_params = json!({
        "department": "CSE_DS",
        "year": "III",
        "section": "B",
        "courseId": "c3",
        "facultyId": "f9"
    });
    let first = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "relationships.assign",
        assign_params.clone(),
    );
    assert_eq!(first["assignedStudents"], json!(2));
    assert_eq!(first["teachingKey"], json!("III_B"));
    assert_eq!(first["partial"], json!(false));
    assert_eq!(
        first["sectionCoursePath"],
        json!("courses/CSE_DS/years/III/sections/B/courseDetails/c3")
    );

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "relationships.assign",
        assign_params,
    );
    assert_eq!(second["partial"], json!(false));

    let faculty = get_doc(&mut stdin, &mut reader, "7", "faculty/CSE_DS/members/f9");
    assert_eq!(faculty["courses"], json!(["c3"]));
    assert_eq!(faculty["teaching"]["III_B"], json!(["s1", "s2"]));

    let student = get_doc(&mut stdin, &mut reader, "8", "students/CSE_DS/B-III/s1");
    assert_eq!(student["courses"], json!(["c3"]));
    // Original roster fields survive the merge.
    assert_eq!(student["rollNo"], json!("21A1"));

    let section_doc = get_doc(
        &mut stdin,
        &mut reader,
        "9",
        "courses/CSE_DS/years/III/sections/B/courseDetails/c3",
    );
    assert_eq!(section_doc["instructor"], json!("f9"));
    assert_eq!(section_doc["studentsBySection"]["B"], json!(["s1", "s2"]));
    assert_eq!(
        section_doc["masterCoursePath"],
        json!("courses/CSE_DS/years/III/sections/ALL_SECTIONS/courseDetails/c3")
    );
    assert_eq!(section_doc["courseCode"], json!("CS301"));
    assert_eq!(section_doc["courseName"], json!("Compilers"));
    // The legacy flat list is retired on every write.
    assert!(section_doc.get("students").is_none());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn explicit_student_subset_narrows_the_teaching_entry() {
    let workspace = temp_dir("enrolld-assign-subset");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    for (id, sid) in [("2", "s1"), ("3", "s2"), ("4", "s3")] {
        seed_doc(
            &mut stdin,
            &mut reader,
            id,
            &format!("students/CSE_DS/B-III/{}", sid),
            json!({ "rollNo": format!("21A{}", &sid[1..]) }),
        );
    }

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "relationships.assign",
        json!({
            "department": "CSE_DS",
            "year": "III",
            "section": "B",
            "courseId": "c3",
            "facultyId": "f9"
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "relationships.assign",
        json!({
            "department": "CSE_DS",
            "year": "III",
            "section": "B",
            "courseId": "c3",
            "facultyId": "f9",
            "studentIds": ["s2"]
        }),
    );

    let faculty = get_doc(&mut stdin, &mut reader, "7", "faculty/CSE_DS/members/f9");
    // The teaching entry is replaced, not merged, so only the subset remains.
    assert_eq!(faculty["teaching"]["III_B"], json!(["s2"]));
    // Students from the first run still carry the course id.
    let s1 = get_doc(&mut stdin, &mut reader, "8", "students/CSE_DS/B-III/s1");
    assert_eq!(s1["courses"], json!(["c3"]));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
