mod db;
mod ipc;
mod settings;
mod workflow;

use std::io::{self, BufRead, Write};

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr; stdout carries only protocol replies.
fn setup_logging(log_level: Option<String>) {
    let level = match log_level
        .unwrap_or_else(|| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("schoold={}", level)))
        .with_writer(io::stderr)
        .without_time()
        .init();
}

fn main() {
    setup_logging(std::env::var("SCHOOLD_LOG").ok());
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "schoold started");

    let mut state = ipc::AppState::default();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("stdin read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                tracing::warn!("unparseable request: {}", e);
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
