use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, normalize_text, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::session::{self, Session};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_ascii_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(email)
}

fn credentials(req: &Request) -> Result<(String, String), serde_json::Value> {
    let raw_email = required_str(req, "email")?;
    let password = required_str(req, "password")?;
    let Some(email) = normalize_email(&raw_email) else {
        return Err(err(&req.id, "bad_params", "email is not valid", None));
    };
    Ok((email, password))
}

/// Bumps the per-user login counter; failures here never block sign-in.
fn record_login(conn: &Connection, user_id: &str) -> i64 {
    let key = format!("login.{}", user_id);
    let prev = db::settings_get_json(conn, &key)
        .ok()
        .flatten()
        .and_then(|v| v.get("count").and_then(|c| c.as_i64()))
        .unwrap_or(0);
    let count = prev + 1;
    if let Err(e) = db::settings_set_json(
        conn,
        &key,
        &json!({ "count": count, "lastLoginAt": db::now_rfc3339() }),
    ) {
        tracing::warn!(user_id, error = %e, "failed to record login");
    }
    count
}

fn handle_sign_up(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (email, password) = match credentials(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if password.chars().count() < MIN_PASSWORD_LEN {
        return err(
            &req.id,
            "bad_params",
            format!("password must be at least {} characters", MIN_PASSWORD_LEN),
            None,
        );
    }
    let full_name = match optional_str(req, "fullName") {
        Ok(v) => normalize_text(v),
        Err(e) => return e,
    };

    let taken: Option<i64> = match conn
        .query_row("SELECT 1 FROM profiles WHERE email = ?", [&email], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if taken.is_some() {
        return err(&req.id, "conflict", "email already registered", None);
    }

    let password_hash = match session::hash_password(&password) {
        Ok(h) => h,
        Err(e) => return err(&req.id, "auth_failed", e.to_string(), None),
    };
    let user_id = Uuid::new_v4().to_string();
    let now = db::now_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO profiles(id, email, password_hash, full_name, student_number, created_at, updated_at)
         VALUES(?, ?, ?, ?, NULL, ?, ?)",
        (&user_id, &email, &password_hash, &full_name, &now, &now),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "profiles" })),
        );
    }
    let login_count = record_login(conn, &user_id);

    state.end_session();
    tracing::info!(user_id = %user_id, "profile created");
    state.session = Some(Session::start(user_id.clone(), email.clone()));
    ok(
        &req.id,
        json!({ "userId": user_id, "email": email, "loginCount": login_count }),
    )
}

fn handle_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let (email, password) = match credentials(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let row: Option<(String, String)> = match conn
        .query_row(
            "SELECT id, password_hash FROM profiles WHERE email = ?",
            [&email],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some((user_id, stored)) = row else {
        return err(&req.id, "unauthorized", "invalid email or password", None);
    };
    if !session::verify_password(&password, &stored) {
        return err(&req.id, "unauthorized", "invalid email or password", None);
    }
    let login_count = record_login(conn, &user_id);

    state.end_session();
    tracing::info!(user_id = %user_id, "signed in");
    state.session = Some(Session::start(user_id.clone(), email.clone()));
    ok(
        &req.id,
        json!({ "userId": user_id, "email": email, "loginCount": login_count }),
    )
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> serde_json::Value {
    let was_signed_in = state.end_session().is_some();
    ok(&req.id, json!({ "wasSignedIn": was_signed_in }))
}

fn handle_session(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.session.as_ref() {
        Some(s) => ok(
            &req.id,
            json!({
                "signedIn": true,
                "userId": s.user_id,
                "email": s.email,
                "startedAt": s.started_at
            }),
        ),
        None => ok(&req.id, json!({ "signedIn": false })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.signUp" => Some(handle_sign_up(state, req)),
        "auth.signIn" => Some(handle_sign_in(state, req)),
        "auth.signOut" => Some(handle_sign_out(state, req)),
        "auth.session" => Some(handle_session(state, req)),
        _ => None,
    }
}
