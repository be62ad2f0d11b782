use crate::calc::{self, ScoreScale};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, require_owned_class, signed_in};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn parse_scale(req: &Request) -> Result<ScoreScale, serde_json::Value> {
    match optional_str(req, "scale")? {
        None => Ok(ScoreScale::default()),
        Some(s) => ScoreScale::parse(&s).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "scale must be one of: raw, percent",
                None,
            )
        }),
    }
}

/// Each call takes a fresh `fetchSeq`. On failure the last completed summaries
/// are returned in `details.previous` so the caller can keep showing them.
fn handle_class_summaries(state: &mut AppState, req: &Request) -> serde_json::Value {
    let scale = match parse_scale(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "not_signed_in", "sign in first", None);
    };

    let seq = session.next_fetch_seq();
    let records = match calc::fetch_grade_records(conn, &session.user_id) {
        Ok(r) => r,
        Err(e) => {
            let previous = session
                .summaries
                .latest()
                .map(|(prev_seq, summaries)| {
                    json!({ "fetchSeq": prev_seq, "summaries": summaries })
                });
            return err(
                &req.id,
                &e.code,
                e.message,
                Some(json!({ "fetchSeq": seq, "previous": previous })),
            );
        }
    };

    let summaries = calc::compute_class_summaries(&records, scale);
    tracing::debug!(
        fetch_seq = seq,
        records = records.len(),
        classes = summaries.len(),
        "class summaries computed"
    );
    let result = json!({
        "summaries": summaries,
        "empty": summaries.is_empty(),
        "fetchSeq": seq,
        "scale": scale.as_str()
    });
    session.summaries.offer(seq, summaries);
    ok(&req.id, result)
}

fn handle_grade_series(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    match calc::fetch_grade_series(conn, &session.user_id, class_id.as_deref()) {
        Ok(points) => ok(
            &req.id,
            json!({
                "classId": class_id,
                "points": points,
                "yDomain": [0, 100]
            }),
        ),
        Err(e) => err(&req.id, &e.code, e.message, e.details),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.classSummaries" => Some(handle_class_summaries(state, req)),
        "chart.gradeSeries" => Some(handle_grade_series(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::session::Session;
    use rusqlite::Connection;

    fn request(id: &str) -> Request {
        Request {
            id: id.to_string(),
            method: "stats.classSummaries".to_string(),
            params: json!({}),
        }
    }

    fn seeded_state() -> AppState {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn.execute_batch(
            "INSERT INTO profiles(id, email, password_hash, created_at, updated_at)
               VALUES('u1', 'u1@example.test', 'x', 't0', 't0');
             INSERT INTO classes(id, owner_id, name, created_at) VALUES('c1', 'u1', 'Math', 't0');
             INSERT INTO assignments(id, class_id, title, max_points, passing_grade, created_at)
               VALUES('a1', 'c1', 'Quiz', 100, 60, 't1');
             INSERT INTO grades(id, assignment_id, student_id, points_earned, created_at)
               VALUES('g1', 'a1', 'u1', 80, 't1');",
        )
        .expect("seed");
        AppState {
            workspace: None,
            db: Some(conn),
            session: Some(Session::start("u1".into(), "u1@example.test".into())),
        }
    }

    #[test]
    fn fetch_failure_reports_previous_summaries() {
        let mut state = seeded_state();
        let first = handle_class_summaries(&mut state, &request("1"));
        assert_eq!(first["ok"], true);
        assert_eq!(first["result"]["fetchSeq"], 1);

        state
            .db
            .as_ref()
            .expect("db")
            .execute_batch("DROP TABLE grades")
            .expect("drop grades");

        let failed = handle_class_summaries(&mut state, &request("2"));
        assert_eq!(failed["ok"], false);
        assert_eq!(failed["error"]["code"], "db_query_failed");
        let details = &failed["error"]["details"];
        assert_eq!(details["fetchSeq"], 2);
        assert_eq!(details["previous"]["fetchSeq"], 1);
        assert_eq!(details["previous"]["summaries"][0]["className"], "Math");
        assert_eq!(details["previous"]["summaries"][0]["avgGrade"], 80.0);
        assert_eq!(details["previous"]["summaries"][0]["assignmentCount"], 1);
    }

    #[test]
    fn first_fetch_failure_has_no_previous() {
        let mut state = seeded_state();
        state
            .db
            .as_ref()
            .expect("db")
            .execute_batch("DROP TABLE grades")
            .expect("drop grades");

        let failed = handle_class_summaries(&mut state, &request("1"));
        assert_eq!(failed["error"]["code"], "db_query_failed");
        assert!(failed["error"]["details"]["previous"].is_null());
    }
}
