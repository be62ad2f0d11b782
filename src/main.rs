mod backup;
mod calc;
mod db;
mod ipc;
mod session;

use clap::{Parser, ValueEnum};
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Grade-tracking sidecar. Reads one JSON request per line on stdin and
/// writes one JSON response per line on stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "gradetrackd", version)]
struct Cli {
    /// Workspace directory to open at startup
    #[arg(long, value_name = "PATH")]
    workspace: Option<PathBuf>,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_env("GRADETRACKD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout is the protocol channel; every log line must go to stderr.
    let (text, json) = match format {
        LogFormat::Text => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(io::stderr),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(io::stderr),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut state = ipc::AppState::default();
    if let Some(path) = cli.workspace.as_ref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::error!(
                error = %e,
                workspace = %path.to_string_lossy(),
                "failed to open startup workspace"
            );
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gradetrackd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    state.end_session();
    tracing::info!("stdin closed, shutting down");
}
