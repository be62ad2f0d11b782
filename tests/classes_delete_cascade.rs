mod test_support;

use serde_json::json;
use test_support::{
    create_class, open_signed_in, request_err_code, request_ok, spawn_sidecar, submit_grade,
};

#[test]
fn deleting_a_class_removes_its_assignments_and_grades() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (workspace, _user) =
        open_signed_in(&mut stdin, &mut reader, "gradetrack-delete", "delete@example.test");

    let chem = create_class(&mut stdin, &mut reader, "1", "Chemistry");
    let phys = create_class(&mut stdin, &mut reader, "2", "Physics");
    submit_grade(&mut stdin, &mut reader, "3", &chem, "Titration", 72.0);
    submit_grade(&mut stdin, &mut reader, "4", &chem, "Stoichiometry", 64.0);
    submit_grade(&mut stdin, &mut reader, "5", &phys, "Kinematics", 88.0);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "assignments.create",
        json!({ "classId": chem, "title": "Ungraded lab", "passingGrade": 50 }),
    );

    let listed = request_ok(&mut stdin, &mut reader, "7", "classes.list", json!({}));
    let chem_row = listed
        .get("classes")
        .and_then(|v| v.as_array())
        .and_then(|arr| {
            arr.iter()
                .find(|c| c.get("id").and_then(|v| v.as_str()) == Some(chem.as_str()))
        })
        .cloned()
        .expect("chem row");
    assert_eq!(chem_row.get("assignmentCount").and_then(|v| v.as_i64()), Some(3));
    assert_eq!(chem_row.get("gradeCount").and_then(|v| v.as_i64()), Some(2));

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "classes.delete",
        json!({ "classId": chem }),
    );
    assert_eq!(deleted.get("gradesDeleted").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(deleted.get("assignmentsDeleted").and_then(|v| v.as_u64()), Some(3));

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "9",
        "classes.get",
        json!({ "classId": chem }),
    );
    assert_eq!(code, "not_found");

    let grades = request_ok(&mut stdin, &mut reader, "10", "grades.list", json!({}));
    assert_eq!(
        grades.get("grades").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );

    let stats = request_ok(&mut stdin, &mut reader, "11", "stats.classSummaries", json!({}));
    let names: Vec<String> = stats
        .get("summaries")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.get("className").and_then(|v| v.as_str()))
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();
    assert_eq!(names, vec!["Physics".to_string()]);

    drop(stdin);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn class_names_are_trimmed_and_required() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (workspace, _user) =
        open_signed_in(&mut stdin, &mut reader, "gradetrack-class-name", "names@example.test");

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        json!({ "name": "   " }),
    );
    assert_eq!(code, "bad_params");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({ "name": "  Geography ", "description": "  " }),
    );
    assert_eq!(created.get("name").and_then(|v| v.as_str()), Some("Geography"));
    let class_id = created.get("classId").and_then(|v| v.as_str()).expect("classId");

    let got = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.get",
        json!({ "classId": class_id }),
    );
    assert!(got.get("description").map(|v| v.is_null()).unwrap_or(false));

    drop(stdin);
    let _ = std::fs::remove_dir_all(workspace);
}
