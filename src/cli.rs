use std::future::Future;
use std::io;
use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufRead, Lines};

use crate::config::{ChatConfig, DeliveryMode};
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "streamchat")]
#[command(version)]
#[command(about = "Terminal client for SSE-streamed and one-shot chat backends")]
pub struct Args {
    /// Message to send once; starts an interactive session when omitted
    pub message: Option<String>,

    /// Chat endpoint URL
    #[arg(long, short)]
    pub endpoint: Option<String>,

    /// Delivery mode (inferred from the endpoint when not given)
    #[arg(long, value_enum)]
    pub mode: Option<DeliveryMode>,

    /// TOML config file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Abort a stream after this many seconds without data
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Write an HTML transcript here on exit
    #[arg(long)]
    pub transcript: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Load the config file (if any) and layer the command-line flags over it.
pub fn resolve_config(args: &Args) -> Result<ChatConfig> {
    let mut config = match &args.config {
        Some(path) => ChatConfig::load(path)?,
        None => ChatConfig::default(),
    };
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(mode) = args.mode {
        config.mode = Some(mode);
    }
    if let Some(secs) = args.idle_timeout {
        config.idle_timeout_secs = Some(secs);
    }
    if let Some(path) = &args.transcript {
        config.transcript = Some(path.clone());
    }
    Ok(config)
}

/// What the interactive prompt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Line(String),
    /// Input closed.
    Eof,
    /// `interrupt` fired before a full line arrived.
    Interrupted,
}

/// Wait for the next prompt line, or for `interrupt` (Ctrl-C in the binary).
///
/// Once a Ctrl-C listener has been installed, SIGINT no longer terminates
/// the process, so the prompt has to listen for it too.
pub async fn read_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> io::Result<ReplInput>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = io::Result<()>>,
{
    tokio::select! {
        line = lines.next_line() => Ok(match line? {
            Some(line) => ReplInput::Line(line),
            None => ReplInput::Eof,
        }),
        _ = interrupt => Ok(ReplInput::Interrupted),
    }
}
