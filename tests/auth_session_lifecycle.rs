mod test_support;

use serde_json::json;
use test_support::{
    create_class, open_signed_in, request_err_code, request_ok, spawn_sidecar, submit_grade,
    temp_dir,
};

#[test]
fn session_lifecycle_and_row_ownership() {
    let workspace = temp_dir("gradetrack-auth");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let code = request_err_code(&mut stdin, &mut reader, "1", "classes.list", json!({}));
    assert_eq!(code, "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let code = request_err_code(&mut stdin, &mut reader, "3", "classes.list", json!({}));
    assert_eq!(code, "not_signed_in");

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "4",
        "auth.signUp",
        json!({ "email": "ada@example.test", "password": "short" }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "5",
        "auth.signUp",
        json!({ "email": "not-an-email", "password": "long enough" }),
    );
    assert_eq!(code, "bad_params");

    let ada = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "auth.signUp",
        json!({ "email": "  Ada@Example.test ", "password": "analytical" }),
    );
    assert_eq!(ada.get("email").and_then(|v| v.as_str()), Some("ada@example.test"));
    assert_eq!(ada.get("loginCount").and_then(|v| v.as_i64()), Some(1));

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "7",
        "auth.signUp",
        json!({ "email": "ada@example.test", "password": "another one" }),
    );
    assert_eq!(code, "conflict");

    let ada_class = create_class(&mut stdin, &mut reader, "8", "Algebra");
    submit_grade(&mut stdin, &mut reader, "9", &ada_class, "Proofs", 95.0);

    let session = request_ok(&mut stdin, &mut reader, "10", "auth.session", json!({}));
    assert_eq!(session.get("signedIn").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(session.get("userId"), ada.get("userId"));

    let out = request_ok(&mut stdin, &mut reader, "11", "auth.signOut", json!({}));
    assert_eq!(out.get("wasSignedIn").and_then(|v| v.as_bool()), Some(true));
    let session = request_ok(&mut stdin, &mut reader, "12", "auth.session", json!({}));
    assert_eq!(session.get("signedIn").and_then(|v| v.as_bool()), Some(false));
    let code = request_err_code(&mut stdin, &mut reader, "13", "stats.classSummaries", json!({}));
    assert_eq!(code, "not_signed_in");

    // A second student sees none of the first student's rows.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "auth.signUp",
        json!({ "email": "grace@example.test", "password": "compiler" }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "15", "classes.list", json!({}));
    assert_eq!(
        listed.get("classes").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
    for (id, method, params) in [
        ("16", "classes.get", json!({ "classId": ada_class })),
        ("17", "classes.delete", json!({ "classId": ada_class })),
        ("18", "assignments.list", json!({ "classId": ada_class })),
        (
            "19",
            "grades.submit",
            json!({ "classId": ada_class, "title": "Intrusion", "pointsEarned": 1 }),
        ),
        ("20", "chart.gradeSeries", json!({ "classId": ada_class })),
    ] {
        let code = request_err_code(&mut stdin, &mut reader, id, method, params);
        assert_eq!(code, "not_found", "{}", method);
    }
    let stats = request_ok(&mut stdin, &mut reader, "21", "stats.classSummaries", json!({}));
    assert_eq!(stats.get("empty").and_then(|v| v.as_bool()), Some(true));

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "22",
        "auth.signIn",
        json!({ "email": "ada@example.test", "password": "wrong password" }),
    );
    assert_eq!(code, "unauthorized");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "23",
        "auth.signIn",
        json!({ "email": "nobody@example.test", "password": "whatever" }),
    );
    assert_eq!(code, "unauthorized");

    let back = request_ok(
        &mut stdin,
        &mut reader,
        "24",
        "auth.signIn",
        json!({ "email": "ADA@example.test", "password": "analytical" }),
    );
    assert_eq!(back.get("userId"), ada.get("userId"));
    assert_eq!(back.get("loginCount").and_then(|v| v.as_i64()), Some(2));
    let stats = request_ok(&mut stdin, &mut reader, "25", "stats.classSummaries", json!({}));
    assert_eq!(
        stats.get("summaries").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );
    // Sequence numbers restart with each session.
    assert_eq!(stats.get("fetchSeq").and_then(|v| v.as_u64()), Some(1));

    // Re-selecting a workspace ends the session.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "26",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let health = request_ok(&mut stdin, &mut reader, "27", "health", json!({}));
    assert_eq!(health.get("signedIn").and_then(|v| v.as_bool()), Some(false));

    drop(stdin);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn sign_up_while_signed_in_replaces_the_session() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (workspace, first_user) = open_signed_in(
        &mut stdin,
        &mut reader,
        "gradetrack-resign",
        "one@example.test",
    );

    let _ = request_ok(&mut stdin, &mut reader, "1", "stats.classSummaries", json!({}));
    let second = request_ok(&mut stdin, &mut reader, "2", "stats.classSummaries", json!({}));
    assert_eq!(second.get("fetchSeq").and_then(|v| v.as_u64()), Some(2));

    let other = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.signUp",
        json!({ "email": "two@example.test", "password": "second user" }),
    );
    let other_id = other.get("userId").and_then(|v| v.as_str()).expect("userId");
    assert_ne!(other_id, first_user);

    let session = request_ok(&mut stdin, &mut reader, "4", "auth.session", json!({}));
    assert_eq!(session.get("userId").and_then(|v| v.as_str()), Some(other_id));
    let fresh = request_ok(&mut stdin, &mut reader, "5", "stats.classSummaries", json!({}));
    assert_eq!(fresh.get("fetchSeq").and_then(|v| v.as_u64()), Some(1));

    drop(stdin);
    let _ = std::fs::remove_dir_all(workspace);
}
