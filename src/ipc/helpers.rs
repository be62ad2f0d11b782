use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::session::Session;
use rusqlite::{Connection, OptionalExtension};

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Absent or null is `None`; any other non-string is rejected.
pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be a string", key),
            None,
        )),
    }
}

pub fn optional_f64(req: &Request, key: &str) -> Result<Option<f64>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(err(
                &req.id,
                "bad_params",
                format!("{} must be a finite number", key),
                None,
            )),
        },
    }
}

/// Trimmed, with empty collapsed to `None`.
pub fn normalize_text(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn db_conn<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn signed_in<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<(&'a Connection, &'a Session), serde_json::Value> {
    let conn = db_conn(state, req)?;
    let session = state
        .session
        .as_ref()
        .ok_or_else(|| err(&req.id, "not_signed_in", "sign in first", None))?;
    Ok((conn, session))
}

/// Classes belong to the profile that created them; other users' ids read as missing.
pub fn require_owned_class(
    conn: &Connection,
    req: &Request,
    owner_id: &str,
    class_id: &str,
) -> Result<(), serde_json::Value> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM classes WHERE id = ? AND owner_id = ?",
            (class_id, owner_id),
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    match found {
        Some(_) => Ok(()),
        None => Err(err(&req.id, "not_found", "class not found", None)),
    }
}
