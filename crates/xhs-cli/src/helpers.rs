//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, config resolution, and the plain-text
//! formatting of backend replies.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing_subscriber::EnvFilter;

use xhs_client::protocol::NoteResult;
use xhs_client::{ClientConfig, Task};

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(false)
        .compact()
        .init();
}

/// Initialize tracing into a file, for modes that own the terminal.
pub fn init_file_tracing(default_level: &str, path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(false)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Resolve the effective config: file, then environment, then flags.
pub fn load_config(
    path: Option<&Path>,
    base_url: Option<String>,
    log_level: Option<String>,
) -> Result<ClientConfig> {
    let mut config = match path {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load_default()?,
    };
    if let Some(url) = base_url {
        config = config.with_base_url(url);
    }
    if let Some(level) = log_level {
        config = config.with_log_level(level);
    }
    config.base().context("invalid base url")?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// One search hit on one line.
pub fn format_result(result: &NoteResult) -> String {
    format!(
        "{}  by {}  ({} likes)  [{} {}]",
        result.title, result.nickname, result.liked_count, result.id, result.xsec_token
    )
}

/// One task on one line.
pub fn format_task(task: &Task) -> String {
    let mut line = format!(
        "{}  {}  [{}]  {:.0}%",
        task.task_id,
        task.keywords,
        task.state.as_str(),
        task.progress.percentage
    );
    if let Some(error) = task.error.as_deref().filter(|e| !e.is_empty()) {
        line.push_str("  error: ");
        line.push_str(error);
    }
    line
}

/// Decode a base64 screenshot, tolerating a `data:` URL prefix.
pub fn decode_screenshot(encoded: &str) -> Result<Vec<u8>> {
    let payload = encoded
        .split_once("base64,")
        .map_or(encoded, |(_, data)| data);
    BASE64
        .decode(payload.trim())
        .context("screenshot is not valid base64")
}
