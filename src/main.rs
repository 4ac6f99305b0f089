mod backup;
mod calc;
mod config;
mod error;
mod import;
mod ipc;
mod persist;
mod records;
mod roles;
mod store;

use std::io::{self, BufRead, Write};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

fn init_logging(filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries the protocol.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(false),
        )
        .init();
}

fn main() {
    let cfg = config::Config::from_env();
    init_logging(&cfg.log_filter);

    let mut state = ipc::AppState {
        workspace: None,
        store: None,
        session: None,
    };

    if let Some(path) = cfg.workspace {
        match store::open_workspace(&path) {
            Ok(s) => {
                info!(workspace = %path.to_string_lossy(), "workspace opened from environment");
                state.workspace = Some(path);
                state.store = Some(s);
            }
            Err(e) => error!(error = %format!("{e:#}"), "startup workspace failed to open"),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "unparseable request line");
                // No id to reply to.
                let resp = serde_json::json!({
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
}
