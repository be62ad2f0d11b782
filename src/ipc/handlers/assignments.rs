use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    normalize_text, optional_f64, optional_str, require_owned_class, required_str, signed_in,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

pub const DEFAULT_MAX_POINTS: f64 = 100.0;
/// Passing threshold when none is given: 60% of `maxPoints`.
pub const DEFAULT_PASSING_FRACTION: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignmentLimits {
    pub max_points: f64,
    pub passing_grade: f64,
}

/// `maxPoints` must be positive; `passingGrade` must lie in `0..=maxPoints`.
pub fn parse_limits(req: &Request) -> Result<AssignmentLimits, serde_json::Value> {
    let max_points = optional_f64(req, "maxPoints")?.unwrap_or(DEFAULT_MAX_POINTS);
    if max_points <= 0.0 {
        return Err(err(&req.id, "bad_params", "maxPoints must be > 0", None));
    }
    let passing_grade = optional_f64(req, "passingGrade")?
        .unwrap_or(max_points * DEFAULT_PASSING_FRACTION);
    if !(0.0..=max_points).contains(&passing_grade) {
        return Err(err(
            &req.id,
            "bad_params",
            "passingGrade must be between 0 and maxPoints",
            Some(json!({ "maxPoints": max_points, "passingGrade": passing_grade })),
        ));
    }
    Ok(AssignmentLimits {
        max_points,
        passing_grade,
    })
}

pub fn insert_assignment(
    conn: &Connection,
    class_id: &str,
    title: &str,
    description: Option<&str>,
    limits: AssignmentLimits,
) -> rusqlite::Result<String> {
    let assignment_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO assignments(id, class_id, title, description, max_points, passing_grade, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &assignment_id,
            class_id,
            title,
            description,
            limits.max_points,
            limits.passing_grade,
            db::now_rfc3339(),
        ),
    )?;
    Ok(assignment_id)
}

pub fn required_title(req: &Request) -> Result<String, serde_json::Value> {
    let title = required_str(req, "title")?.trim().to_string();
    if title.is_empty() {
        return Err(err(&req.id, "bad_params", "title must not be empty", None));
    }
    Ok(title)
}

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match signed_in(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_owned_class(conn, req, &session.user_id, &class_id) {
        return e;
    }

    let mut stmt = match conn.prepare(
        "SELECT id, title, description, max_points, passing_grade, created_at
         FROM assignments
         WHERE class_id = ?
         ORDER BY created_at, rowid",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&class_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "title": r.get::<_, String>(1)?,
                "description": r.get::<_, Option<String>>(2)?,
                "maxPoints": r.get::<_, f64>(3)?,
                "passingGrade": r.get::<_, f64>(4)?,
                "createdAt": r.get::<_, String>(5)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(assignments) => ok(&req.id, json!({ "assignments": assignments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_assignments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let description = match optional_str(req, "description") {
        Ok(v) => normalize_text(v),
        Err(e) => return e,
    };
    let limits = match parse_limits(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_owned_class(conn, req, &session.user_id, &class_id) {
        return e;
    }

    match insert_assignment(conn, &class_id, &title, description.as_deref(), limits) {
        Ok(assignment_id) => ok(
            &req.id,
            json!({
                "assignmentId": assignment_id,
                "maxPoints": limits.max_points,
                "passingGrade": limits.passing_grade
            }),
        ),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "assignments" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.list" => Some(handle_assignments_list(state, req)),
        "assignments.create" => Some(handle_assignments_create(state, req)),
        _ => None,
    }
}
