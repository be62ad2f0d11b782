use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const FAMILIES: &[TryHandle] = &[
    handlers::core::try_handle,
    handlers::auth::try_handle,
    handlers::profile::try_handle,
    handlers::theme::try_handle,
    handlers::classes::try_handle,
    handlers::assignments::try_handle,
    handlers::grades::try_handle,
    handlers::stats::try_handle,
    handlers::backup::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    let span = tracing::info_span!("request", id = %req.id, method = %req.method);
    let _guard = span.enter();

    for try_handle in FAMILIES {
        if let Some(resp) = try_handle(state, &req) {
            if let Some(error) = resp.get("error") {
                tracing::warn!(
                    code = error.get("code").and_then(|v| v.as_str()).unwrap_or(""),
                    message = error.get("message").and_then(|v| v.as_str()).unwrap_or(""),
                    "request failed"
                );
            } else {
                tracing::debug!("request ok");
            }
            return resp;
        }
    }

    tracing::warn!("unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
