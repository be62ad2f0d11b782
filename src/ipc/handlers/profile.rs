use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{normalize_text, signed_in};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::{json, Value};

const MAX_FIELD_CHARS: usize = 120;

fn parse_text_field(v: &Value, key: &str) -> Result<Option<String>, String> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) => {
            let text = normalize_text(Some(s.clone()));
            if text.as_ref().map(|t| t.chars().count()).unwrap_or(0) > MAX_FIELD_CHARS {
                return Err(format!("{} must be at most {} characters", key, MAX_FIELD_CHARS));
            }
            Ok(text)
        }
        _ => Err(format!("{} must be a string or null", key)),
    }
}

fn handle_profile_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match signed_in(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let row = conn
        .query_row(
            "SELECT id, email, full_name, student_number, updated_at FROM profiles WHERE id = ?",
            [&session.user_id],
            |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "email": r.get::<_, String>(1)?,
                    "fullName": r.get::<_, Option<String>>(2)?,
                    "studentNumber": r.get::<_, Option<String>>(3)?,
                    "updatedAt": r.get::<_, String>(4)?
                }))
            },
        )
        .optional();
    match row {
        Ok(Some(profile)) => ok(&req.id, profile),
        Ok(None) => err(&req.id, "not_found", "profile not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_profile_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match signed_in(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut full_name: Option<Option<String>> = None;
    let mut student_number: Option<Option<String>> = None;
    for (k, v) in patch {
        let parsed = match k.as_str() {
            "fullName" => parse_text_field(v, k).map(|t| full_name = Some(t)),
            "studentNumber" => parse_text_field(v, k).map(|t| student_number = Some(t)),
            _ => Err(format!("unknown profile field: {}", k)),
        };
        if let Err(msg) = parsed {
            return err(&req.id, "bad_params", msg, None);
        }
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Some(v) = full_name {
        if let Err(e) = tx.execute(
            "UPDATE profiles SET full_name = ? WHERE id = ?",
            (&v, &session.user_id),
        ) {
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }
    if let Some(v) = student_number {
        if let Err(e) = tx.execute(
            "UPDATE profiles SET student_number = ? WHERE id = ?",
            (&v, &session.user_id),
        ) {
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }
    if let Err(e) = tx.execute(
        "UPDATE profiles SET updated_at = ? WHERE id = ?",
        (db::now_rfc3339(), &session.user_id),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "profile.get" => Some(handle_profile_get(state, req)),
        "profile.update" => Some(handle_profile_update(state, req)),
        _ => None,
    }
}
