use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::signed_in;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Light,
    Dark,
}

impl Mode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Accent {
    Purple,
    Blue,
    Green,
    Orange,
    Pink,
}

impl Accent {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "purple" => Some(Self::Purple),
            "blue" => Some(Self::Blue),
            "green" => Some(Self::Green),
            "orange" => Some(Self::Orange),
            "pink" => Some(Self::Pink),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Purple => "purple",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Orange => "orange",
            Self::Pink => "pink",
        }
    }

    /// (primary, light, dark)
    fn palette(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Purple => ("#8B5CF6", "#A78BFA", "#7C3AED"),
            Self::Blue => ("#0EA5E9", "#38BDF8", "#0284C7"),
            Self::Green => ("#10B981", "#34D399", "#059669"),
            Self::Orange => ("#F97316", "#FB923C", "#EA580C"),
            Self::Pink => ("#EC4899", "#F472B6", "#DB2777"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Theme {
    mode: Mode,
    accent: Accent,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            mode: Mode::Light,
            accent: Accent::Purple,
        }
    }
}

impl Theme {
    fn to_json(self) -> Value {
        let (primary, light, dark) = self.accent.palette();
        json!({
            "mode": self.mode.as_str(),
            "accentColor": self.accent.as_str(),
            "palette": { "primary": primary, "light": light, "dark": dark }
        })
    }

    fn stored_json(self) -> Value {
        json!({ "mode": self.mode.as_str(), "accentColor": self.accent.as_str() })
    }

    fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        for (k, v) in patch {
            let s = v
                .as_str()
                .ok_or_else(|| format!("{} must be a string", k))?;
            match k.as_str() {
                "mode" => {
                    self.mode = Mode::parse(s).ok_or_else(|| format!("unknown mode: {}", s))?;
                }
                "accentColor" => {
                    self.accent =
                        Accent::parse(s).ok_or_else(|| format!("unknown accentColor: {}", s))?;
                }
                _ => return Err(format!("unknown theme field: {}", k)),
            }
        }
        Ok(())
    }
}

fn theme_key(user_id: &str) -> String {
    format!("theme.{}", user_id)
}

fn load_theme(conn: &Connection, user_id: &str) -> anyhow::Result<Theme> {
    let mut current = Theme::default();
    if let Some(saved) = db::settings_get_json(conn, &theme_key(user_id))? {
        if let Some(saved_obj) = saved.as_object() {
            // A malformed stored theme falls back to defaults as a whole.
            let mut candidate = current;
            if candidate.apply_patch(saved_obj).is_ok() {
                current = candidate;
            }
        }
    }
    Ok(current)
}

fn save_theme(conn: &Connection, user_id: &str, theme: Theme) -> anyhow::Result<()> {
    db::settings_set_json(conn, &theme_key(user_id), &theme.stored_json())
}

fn handle_theme_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match signed_in(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match load_theme(conn, &session.user_id) {
        Ok(theme) => ok(&req.id, theme.to_json()),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_theme_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match signed_in(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    let mut theme = match load_theme(conn, &session.user_id) {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = theme.apply_patch(patch) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = save_theme(conn, &session.user_id, theme) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, theme.to_json())
}

fn handle_theme_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, session) = match signed_in(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut theme = match load_theme(conn, &session.user_id) {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    theme.mode = theme.mode.toggled();
    if let Err(e) = save_theme(conn, &session.user_id, theme) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, theme.to_json())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "theme.get" => Some(handle_theme_get(state, req)),
        "theme.update" => Some(handle_theme_update(state, req)),
        "theme.toggle" => Some(handle_theme_toggle(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_rejects_unknown_accent_and_applies_valid_fields() {
        let mut theme = Theme::default();
        let bad = json!({ "accentColor": "teal" });
        assert!(theme.apply_patch(bad.as_object().unwrap()).is_err());

        let good = json!({ "mode": "dark", "accentColor": "green" });
        theme.apply_patch(good.as_object().unwrap()).expect("apply");
        assert_eq!(theme.mode, Mode::Dark);
        assert_eq!(theme.accent, Accent::Green);
        assert_eq!(theme.to_json()["palette"]["primary"], "#10B981");
    }

    #[test]
    fn malformed_stored_theme_falls_back_to_defaults() {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        db::settings_set_json(&conn, "theme.u1", &json!({ "mode": 7 })).expect("seed");
        assert_eq!(load_theme(&conn, "u1").expect("load"), Theme::default());
        assert_eq!(load_theme(&conn, "u2").expect("load"), Theme::default());
    }
}
