//! Collaborator contracts between the dispatcher and whatever displays the
//! conversation.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Displays bubbles and the in-progress assistant reply.
///
/// Output is append-only: a sink never rewrites a bubble once appended. The
/// streaming bubble opened by `begin_stream` is either completed by
/// `finish_stream` or removed by `discard_stream`.
pub trait RenderSink {
    /// Toggle the sending indicator and input lock.
    fn set_sending(&mut self, sending: bool);

    /// Append a finished bubble. `text` is raw; sinks that produce markup
    /// format it with [`crate::render::render_content`].
    fn append_bubble(&mut self, role: Role, text: &str, timestamp: &str);

    /// Open an empty assistant bubble for a streamed reply.
    fn begin_stream(&mut self);

    /// Cheap raw-text refresh of the streaming bubble with the text so far.
    fn update_stream(&mut self, raw_text: &str);

    /// Replace the streaming bubble's text with the final markup rendered
    /// from everything passed to `update_stream`.
    fn finish_stream(&mut self, markup: &str, timestamp: &str);

    /// Remove the streaming bubble and everything shown in it.
    fn discard_stream(&mut self);
}

/// Shows failures to the user.
pub trait ErrorSink {
    fn show_error(&mut self, message: &str);
    fn clear_error(&mut self);
}

/// Default interval after which a shown error hides itself.
pub const DEFAULT_ERROR_DISMISS: Duration = Duration::from_secs(9);

/// An error message that auto-dismisses after a fixed interval.
#[derive(Debug, Clone)]
pub struct ErrorBanner {
    dismiss_after: Duration,
    shown: Option<(String, Instant)>,
}

impl ErrorBanner {
    pub fn new(dismiss_after: Duration) -> Self {
        ErrorBanner {
            dismiss_after,
            shown: None,
        }
    }

    pub fn show(&mut self, message: &str) {
        self.shown = Some((message.to_string(), Instant::now()));
    }

    pub fn clear(&mut self) {
        self.shown = None;
    }

    /// The message if it is still within its display interval.
    pub fn visible(&self) -> Option<&str> {
        self.visible_at(Instant::now())
    }

    pub fn visible_at(&self, now: Instant) -> Option<&str> {
        let (message, at) = self.shown.as_ref()?;
        (now.saturating_duration_since(*at) < self.dismiss_after).then_some(message.as_str())
    }
}

impl Default for ErrorBanner {
    fn default() -> Self {
        ErrorBanner::new(DEFAULT_ERROR_DISMISS)
    }
}
