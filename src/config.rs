use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// How the backend delivers replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// SSE-framed stream of `chunk` / `done` / `error` records.
    #[value(name = "stream")]
    #[serde(rename = "stream")]
    Streaming,
    /// One JSON body with `reply` or `error`.
    #[value(name = "oneshot")]
    #[serde(rename = "oneshot")]
    OneShot,
}

impl DeliveryMode {
    /// Pick the mode from the endpoint path: `.../stream` streams,
    /// everything else is one-shot.
    pub fn infer(endpoint: &str) -> Self {
        let path = endpoint
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or(endpoint)
            .trim_end_matches('/');
        if path.ends_with("/stream") {
            DeliveryMode::Streaming
        } else {
            DeliveryMode::OneShot
        }
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Streaming => write!(f, "stream"),
            DeliveryMode::OneShot => write!(f, "oneshot"),
        }
    }
}

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/api/chat";
pub const DEFAULT_ERROR_DISMISS_SECS: u64 = 9;

/// Client configuration, loaded from TOML and overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatConfig {
    pub endpoint: String,
    /// Explicit delivery mode; inferred from `endpoint` when absent.
    pub mode: Option<DeliveryMode>,
    /// Abort a stream after this many seconds without data. Off when absent.
    pub idle_timeout_secs: Option<u64>,
    pub error_dismiss_secs: u64,
    /// Endpoint for the `/clear` REPL command.
    pub clear_endpoint: Option<String>,
    /// HTML transcript written when the client exits.
    pub transcript: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            mode: None,
            idle_timeout_secs: None,
            error_dismiss_secs: DEFAULT_ERROR_DISMISS_SECS,
            clear_endpoint: None,
            transcript: None,
        }
    }
}

impl ChatConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| ChatError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ChatError::Config(e.to_string()))
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.mode
            .unwrap_or_else(|| DeliveryMode::infer(&self.endpoint))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn error_dismiss(&self) -> Duration {
        Duration::from_secs(self.error_dismiss_secs)
    }
}
