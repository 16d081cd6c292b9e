use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const ENABLED_ENV: &str = "AGENTCORE_CHAT_OBSERVABILITY";
const LEVEL_ENV: &str = "AGENTCORE_CHAT_LOG_LEVEL";
const JSON_PATH_ENV: &str = "AGENTCORE_CHAT_JSON_LOG_PATH";
const DEFAULT_LOG_FILE: &str = "agentcore-chat.logs.jsonl";

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn resolve_env_filter(level: Option<String>) -> EnvFilter {
    if let Some(level) = level
        && let Ok(filter) = EnvFilter::try_new(level)
    {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

// Splits a log path into (directory, file name) for the appender.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Installs the tracing subscriber once per process.
///
/// Environment variables:
/// - `AGENTCORE_CHAT_OBSERVABILITY`: set to `0`/`false` to disable (default enabled).
/// - `AGENTCORE_CHAT_LOG_LEVEL`: level or filter directive; falls back to `RUST_LOG`, then `info`.
/// - `AGENTCORE_CHAT_JSON_LOG_PATH`: write JSON lines to this file instead of the console.
///
/// Console output goes to stderr so streamed answers on stdout stay clean.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let enabled = std::env::var(ENABLED_ENV)
            .ok()
            .and_then(|v| parse_bool_env(&v))
            .unwrap_or(true);
        if !enabled {
            return;
        }

        let env_filter = resolve_env_filter(std::env::var(LEVEL_ENV).ok());
        match std::env::var(JSON_PATH_ENV) {
            Ok(raw) if !raw.trim().is_empty() => {
                let (dir, file_name) = split_log_path(Path::new(raw.trim()));
                let _ = std::fs::create_dir_all(&dir);
                let writer = tracing_appender::rolling::never(dir, file_name);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(false)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            _ => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
        }
    });
}
