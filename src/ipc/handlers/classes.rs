use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    normalize_text, optional_str, require_owned_class, required_str, signed_in,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match signed_in(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Correlated subqueries avoid double-counting from joins.
    let mut stmt = match conn.prepare(
        "SELECT
           c.id,
           c.name,
           c.description,
           c.created_at,
           (SELECT COUNT(*) FROM assignments a WHERE a.class_id = c.id) AS assignment_count,
           (SELECT COUNT(*)
              FROM grades g
              JOIN assignments a ON a.id = g.assignment_id
             WHERE a.class_id = c.id AND g.student_id = c.owner_id) AS grade_count
         FROM classes c
         WHERE c.owner_id = ?
         ORDER BY c.created_at, c.rowid",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&session.user_id], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "description": row.get::<_, Option<String>>(2)?,
                "createdAt": row.get::<_, String>(3)?,
                "assignmentCount": row.get::<_, i64>(4)?,
                "gradeCount": row.get::<_, i64>(5)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match signed_in(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }
    let description = match optional_str(req, "description") {
        Ok(v) => normalize_text(v),
        Err(e) => return e,
    };

    let class_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO classes(id, owner_id, name, description, created_at) VALUES(?, ?, ?, ?, ?)",
        (
            &class_id,
            &session.user_id,
            &name,
            &description,
            db::now_rfc3339(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }

    tracing::info!(class_id = %class_id, "class created");
    ok(&req.id, json!({ "classId": class_id, "name": name }))
}

fn handle_classes_get(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    match conn.query_row(
        "SELECT id, name, description, created_at FROM classes WHERE id = ?",
        [&class_id],
        |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "description": r.get::<_, Option<String>>(2)?,
                "createdAt": r.get::<_, String>(3)?
            }))
        },
    ) {
        Ok(class) => ok(&req.id, class),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Dependency order: grades, assignments, class (no ON DELETE CASCADE).
    let grades_deleted = match tx.execute(
        "DELETE FROM grades
         WHERE assignment_id IN (SELECT id FROM assignments WHERE class_id = ?)",
        [&class_id],
    ) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "grades" })),
            );
        }
    };

    let assignments_deleted =
        match tx.execute("DELETE FROM assignments WHERE class_id = ?", [&class_id]) {
            Ok(n) => n,
            Err(e) => {
                let _ = tx.rollback();
                return err(
                    &req.id,
                    "db_delete_failed",
                    e.to_string(),
                    Some(json!({ "table": "assignments" })),
                );
            }
        };

    if let Err(e) = tx.execute("DELETE FROM classes WHERE id = ?", [&class_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    tracing::info!(
        class_id = %class_id,
        grades_deleted,
        assignments_deleted,
        "class deleted"
    );
    ok(
        &req.id,
        json!({
            "ok": true,
            "gradesDeleted": grades_deleted,
            "assignmentsDeleted": assignments_deleted
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.get" => Some(handle_classes_get(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
