use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::core::open_workspace;
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_export_workspace(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };

    match backup::export_workspace_bundle(&workspace, &out_path) {
        Ok(summary) => {
            tracing::info!(
                out = %out_path.to_string_lossy(),
                bytes = summary.db_bytes,
                "workspace exported"
            );
            ok(
                &req.id,
                json!({
                    "outPath": out_path.to_string_lossy(),
                    "bundleFormat": summary.bundle_format,
                    "dbSha256": summary.db_sha256,
                    "dbBytes": summary.db_bytes
                }),
            )
        }
        Err(e) => err(&req.id, "backup_failed", format!("{e:#}"), None),
    }
}

/// Replaces the target workspace database with the bundle's copy and reopens it.
fn handle_import_workspace(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match required_str(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let workspace = match req.params.get("workspacePath").and_then(|v| v.as_str()) {
        Some(p) => PathBuf::from(p),
        None => match state.workspace.clone() {
            Some(p) => p,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "missing workspacePath and no workspace selected",
                    None,
                )
            }
        },
    };

    // Nothing is closed until the bundle checks out.
    let bundle = match backup::verify_workspace_bundle(&in_path) {
        Ok(b) => b,
        Err(e) => return err(&req.id, "backup_failed", format!("{e:#}"), None),
    };

    let was_current = state.workspace.as_deref() == Some(workspace.as_path());
    let mut kept_session = None;
    if was_current {
        kept_session = state.session.take();
        state.db = None;
        state.workspace = None;
    }

    let summary = match backup::restore_workspace_bundle(bundle, &workspace) {
        Ok(s) => s,
        Err(e) => {
            if was_current {
                // A failed temp-file write leaves the existing database in place.
                match open_workspace(state, &workspace) {
                    Ok(()) => state.session = kept_session,
                    Err(reopen) => tracing::error!(
                        error = %reopen,
                        "failed to reopen workspace after import error"
                    ),
                }
            }
            return err(&req.id, "backup_failed", format!("{e:#}"), None);
        }
    };
    if let Some(s) = kept_session.as_ref() {
        tracing::info!(user_id = %s.user_id, "session ended");
    }
    if let Err(e) = open_workspace(state, &workspace) {
        return err(&req.id, "db_open_failed", format!("{e:?}"), None);
    }

    ok(
        &req.id,
        json!({
            "workspacePath": workspace.to_string_lossy(),
            "bundleFormat": summary.bundle_format,
            "dbSha256": summary.db_sha256
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspace" => Some(handle_export_workspace(state, req)),
        "backup.importWorkspace" => Some(handle_import_workspace(state, req)),
        _ => None,
    }
}
