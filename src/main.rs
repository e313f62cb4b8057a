mod config;
mod decl;
mod filter;
mod ipc;
mod profiles;
mod record;
mod stats;
mod views;

use std::io::{self, BufRead, Write};

fn main() {
    let (cfg, cfg_problem) = config::load();
    config::init_logging(&cfg.log_filter);
    if let Some(e) = cfg_problem {
        let detail = format!("{e:#}");
        tracing::warn!(error = %detail, "config file ignored; using defaults");
    }

    let (mut state, rejected) = ipc::AppState::new(cfg);
    for (name, e) in rejected {
        tracing::warn!(profile = %name, error = %e, "configured profile rejected");
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        profiles = state.profiles.len(),
        "edutrackd ready"
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                tracing::warn!(error = %e, "unparsable request line");
                ipc::bad_json(e.to_string())
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
