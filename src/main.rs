use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use streamchat::cli::{read_input, resolve_config, Args, ReplInput};
use streamchat::terminal::{TerminalErrors, TerminalView};
use streamchat::{ChatConfig, Dispatcher, HttpTransport, SendOutcome};

type Chat = Dispatcher<HttpTransport, TerminalView<std::io::Stdout>, TerminalErrors<std::io::Stderr>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.no_color {
        colored::control::set_override(false);
    }

    let config = resolve_config(&args)?;
    let single = args.message.is_some();
    let mut chat: Chat = Dispatcher::new(
        HttpTransport::new(),
        TerminalView::stdout(single),
        TerminalErrors::stderr(config.error_dismiss()),
        &config,
    );
    info!(
        session = %chat.session_id(),
        endpoint = %config.endpoint,
        mode = %chat.mode(),
        "chat session started"
    );

    let result = match &args.message {
        Some(message) => match chat.send_message(message).await {
            SendOutcome::Failed { message } => Err(message.into()),
            SendOutcome::Replied { .. } | SendOutcome::Ignored => Ok(()),
        },
        None => repl(&mut chat, &config).await,
    };

    if let Some(path) = &config.transcript {
        chat.render().write_transcript(path)?;
        eprintln!("{} {}", "transcript written to".bright_blue(), path.display());
    }
    result
}

async fn repl(chat: &mut Chat, config: &ChatConfig) -> Result<(), Box<dyn std::error::Error>> {
    print_header(chat, config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let marker = if chat.errors().active().is_some() {
            "[!] ".bright_red().to_string()
        } else {
            String::new()
        };
        print!("{marker}{} ", "›".bright_green().bold());
        std::io::Write::flush(&mut std::io::stdout())?;

        let line = match read_input(&mut lines, tokio::signal::ctrl_c()).await? {
            ReplInput::Line(line) => line,
            ReplInput::Eof | ReplInput::Interrupted => {
                println!();
                break;
            }
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                clear_history(chat, config).await;
                continue;
            }
            _ => {}
        }

        tokio::select! {
            _ = chat.send_message(&line) => {}
            _ = tokio::signal::ctrl_c() => {
                println!();
                eprintln!("{}", "cancelled".bright_yellow());
            }
        }
    }
    Ok(())
}

async fn clear_history(chat: &Chat, config: &ChatConfig) {
    let Some(endpoint) = &config.clear_endpoint else {
        eprintln!("{}", "no clear_endpoint configured".bright_yellow());
        return;
    };
    match chat.transport().clear_history(endpoint).await {
        Ok(()) => println!("{}", "history cleared".bright_blue()),
        Err(e) => eprintln!("{} {}", "error:".bright_red().bold(), e.user_message()),
    }
}

fn print_header(chat: &Chat, config: &ChatConfig) {
    println!("{}", "STREAMCHAT".bright_cyan().bold());
    println!("{}: {}", "Endpoint".bright_yellow(), config.endpoint);
    println!("{}: {}", "Mode".bright_yellow(), chat.mode());
    if let Some(timeout) = config.idle_timeout() {
        println!("{}: {}s", "Idle timeout".bright_yellow(), timeout.as_secs());
    }
    println!(
        "{}",
        "Enter sends. /clear resets history, /quit exits.".bright_blue()
    );
    println!("{}", "=".repeat(50).bright_blue());
}
