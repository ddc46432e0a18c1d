//! Terminal implementations of the render and error sinks.

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use colored::*;

use crate::error::Result;
use crate::render::{escape_html, render_content};
use crate::view::{ErrorBanner, ErrorSink, RenderSink, Role};

/// One bubble as it appeared in the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub role: Role,
    /// Safe markup produced by the formatter.
    pub markup: String,
    pub timestamp: String,
}

/// Prints the conversation to a terminal and keeps a transcript of it.
pub struct TerminalView<W: Write> {
    out: W,
    /// Print user bubbles. Off in the REPL, where the user's own line is
    /// already on screen.
    echo_user: bool,
    sending: bool,
    /// Bytes of the streaming reply already on screen.
    printed: usize,
    transcript: Vec<TranscriptEntry>,
}

impl TerminalView<io::Stdout> {
    pub fn stdout(echo_user: bool) -> Self {
        TerminalView::new(io::stdout(), echo_user)
    }
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, echo_user: bool) -> Self {
        TerminalView {
            out,
            echo_user,
            sending: false,
            printed: 0,
            transcript: Vec::new(),
        }
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Render the transcript as a standalone HTML page.
    pub fn transcript_html(&self) -> String {
        let mut html = String::from(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Chat transcript</title>\n</head>\n<body>\n",
        );
        for entry in &self.transcript {
            html.push_str(&format!(
                "<div class=\"bubble bubble-{}\">\n  <div class=\"content\">{}</div>\n  <div class=\"time\">{}</div>\n</div>\n",
                entry.role,
                entry.markup,
                escape_html(&entry.timestamp),
            ));
        }
        html.push_str("</body>\n</html>\n");
        html
    }

    pub fn write_transcript(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.transcript_html())?;
        Ok(())
    }

    fn label(role: Role) -> ColoredString {
        match role {
            Role::User => "you ›".bright_green().bold(),
            Role::Assistant => "assistant ›".bright_cyan().bold(),
        }
    }

    fn reset_stream(&mut self) {
        self.printed = 0;
    }
}

impl<W: Write> RenderSink for TerminalView<W> {
    fn set_sending(&mut self, sending: bool) {
        self.sending = sending;
    }

    fn append_bubble(&mut self, role: Role, text: &str, timestamp: &str) {
        self.transcript.push(TranscriptEntry {
            role,
            markup: render_content(text),
            timestamp: timestamp.to_string(),
        });
        if role == Role::User && !self.echo_user {
            return;
        }
        let _ = writeln!(
            self.out,
            "{} {} {}",
            Self::label(role),
            text,
            format!("[{timestamp}]").dimmed()
        );
        let _ = self.out.flush();
    }

    fn begin_stream(&mut self) {
        self.reset_stream();
        let _ = write!(self.out, "{} ", Self::label(Role::Assistant));
        let _ = self.out.flush();
    }

    fn update_stream(&mut self, raw_text: &str) {
        // Only the new suffix goes to the terminal.
        let new = raw_text.get(self.printed..).unwrap_or(raw_text);
        let _ = write!(self.out, "{new}");
        let _ = self.out.flush();
        self.printed = raw_text.len();
    }

    fn finish_stream(&mut self, markup: &str, timestamp: &str) {
        let _ = writeln!(self.out, " {}", format!("[{timestamp}]").dimmed());
        let _ = self.out.flush();
        self.transcript.push(TranscriptEntry {
            role: Role::Assistant,
            markup: markup.to_string(),
            timestamp: timestamp.to_string(),
        });
        self.reset_stream();
    }

    fn discard_stream(&mut self) {
        if self.printed > 0 {
            let _ = writeln!(self.out, " {}", "(discarded)".dimmed());
        } else {
            let _ = writeln!(self.out);
        }
        let _ = self.out.flush();
        self.reset_stream();
    }
}

/// Writes errors to a terminal and remembers them for the dismiss interval.
pub struct TerminalErrors<W: Write> {
    out: W,
    banner: ErrorBanner,
}

impl TerminalErrors<io::Stderr> {
    pub fn stderr(dismiss_after: Duration) -> Self {
        TerminalErrors::new(io::stderr(), dismiss_after)
    }
}

impl<W: Write> TerminalErrors<W> {
    pub fn new(out: W, dismiss_after: Duration) -> Self {
        TerminalErrors {
            out,
            banner: ErrorBanner::new(dismiss_after),
        }
    }

    /// The last error, while it is still within its display interval.
    pub fn active(&self) -> Option<&str> {
        self.banner.visible()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ErrorSink for TerminalErrors<W> {
    fn show_error(&mut self, message: &str) {
        self.banner.show(message);
        let _ = writeln!(self.out, "{} {}", "error:".bright_red().bold(), message.bright_red());
        let _ = self.out.flush();
    }

    fn clear_error(&mut self) {
        self.banner.clear();
    }
}
