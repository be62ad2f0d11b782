use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::assignments::{insert_assignment, parse_limits, required_title};
use crate::ipc::helpers::{
    optional_f64, optional_str, require_owned_class, required_str, signed_in,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

/// Creates an assignment and the signed-in student's grade for it in one step.
fn handle_grades_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match signed_in(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match required_title(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let limits = match parse_limits(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let points = match optional_f64(req, "pointsEarned") {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing pointsEarned", None),
        Err(e) => return e,
    };
    if !(0.0..=limits.max_points).contains(&points) {
        return err(
            &req.id,
            "bad_params",
            format!("pointsEarned must be between 0 and {}", limits.max_points),
            Some(json!({ "pointsEarned": points, "maxPoints": limits.max_points })),
        );
    }
    if let Err(e) = require_owned_class(conn, req, &session.user_id, &class_id) {
        return e;
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let assignment_id = match insert_assignment(&tx, &class_id, &title, None, limits) {
        Ok(id) => id,
        Err(e) => {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "assignments" })),
            );
        }
    };
    let grade_id = Uuid::new_v4().to_string();
    if let Err(e) = tx.execute(
        "INSERT INTO grades(id, assignment_id, student_id, points_earned, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (
            &grade_id,
            &assignment_id,
            &session.user_id,
            points,
            db::now_rfc3339(),
        ),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "grades" })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    tracing::info!(class_id = %class_id, grade_id = %grade_id, "grade submitted");
    ok(
        &req.id,
        json!({ "gradeId": grade_id, "assignmentId": assignment_id }),
    )
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match signed_in(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match optional_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Some(cid) = class_id.as_deref() {
        if let Err(e) = require_owned_class(conn, req, &session.user_id, cid) {
            return e;
        }
    }

    let mut stmt = match conn.prepare(
        "SELECT g.id, g.points_earned, g.created_at, a.id, a.title, a.class_id, a.max_points, a.passing_grade
         FROM grades g
         JOIN assignments a ON a.id = g.assignment_id
         WHERE g.student_id = ?1
           AND (?2 IS NULL OR a.class_id = ?2)
         ORDER BY g.created_at, g.rowid",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map((&session.user_id, class_id.as_deref()), |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "pointsEarned": r.get::<_, f64>(1)?,
                "createdAt": r.get::<_, String>(2)?,
                "assignmentId": r.get::<_, String>(3)?,
                "title": r.get::<_, String>(4)?,
                "classId": r.get::<_, Option<String>>(5)?,
                "maxPoints": r.get::<_, f64>(6)?,
                "passingGrade": r.get::<_, f64>(7)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(grades) => ok(&req.id, json!({ "grades": grades })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.submit" => Some(handle_grades_submit(state, req)),
        "grades.list" => Some(handle_grades_list(state, req)),
        _ => None,
    }
}
