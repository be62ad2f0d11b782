use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::session::Session;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<Session>,
}

impl AppState {
    pub fn end_session(&mut self) -> Option<Session> {
        let ended = self.session.take();
        if let Some(s) = ended.as_ref() {
            tracing::info!(user_id = %s.user_id, "session ended");
        }
        ended
    }
}
