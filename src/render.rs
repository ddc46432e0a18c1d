//! Markdown-lite formatting of assistant text and the per-message render
//! state used while a reply streams in.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```\w*\n?(.*?)```").expect("fenced code regex"));
static INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("inline code regex"));
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold regex"));
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.+?)\*").expect("italic regex"));

/// Escape the five HTML metacharacters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render raw assistant text to safe markup.
///
/// The input is escaped before any formatting is applied, so nothing in it is
/// ever interpreted as HTML. Supported: fenced code blocks (language tag
/// dropped, trailing whitespace trimmed), `inline code`, `**bold**`,
/// `*italic*`, and newlines as `<br>` outside code blocks. Pure and
/// deterministic.
pub fn render_content(text: &str) -> String {
    let escaped = escape_html(text);
    let mut out = String::with_capacity(escaped.len() + 32);
    let mut last = 0;
    let mut after_pre = false;

    for caps in FENCED_CODE.captures_iter(&escaped) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&render_inline(&escaped[last..whole.start()], after_pre, true));
        let code = caps.get(1).map_or("", |m| m.as_str());
        out.push_str("<pre><code>");
        out.push_str(code.trim_end());
        out.push_str("</code></pre>");
        last = whole.end();
        after_pre = true;
    }
    out.push_str(&render_inline(&escaped[last..], after_pre, false));
    out
}

fn render_inline(segment: &str, after_pre: bool, before_pre: bool) -> String {
    let s = INLINE_CODE.replace_all(segment, "<code>$1</code>");
    let s = BOLD.replace_all(&s, "<strong>$1</strong>");
    let s = ITALIC.replace_all(&s, "<em>$1</em>");
    line_breaks(&s, after_pre, before_pre)
}

// A newline directly touching a code block stays a newline.
fn line_breaks(segment: &str, after_pre: bool, before_pre: bool) -> String {
    let last = segment.len().saturating_sub(1);
    let mut out = String::with_capacity(segment.len());
    for (i, c) in segment.char_indices() {
        if c != '\n' {
            out.push(c);
            continue;
        }
        let touches_pre = (after_pre && i == 0) || (before_pre && i == last);
        if touches_pre {
            out.push('\n');
        } else {
            out.push_str("<br>");
        }
    }
    out
}

// ---------------------------------------------------------------------------
// RenderState
// ---------------------------------------------------------------------------

/// Text accumulated for the assistant message currently streaming in.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RenderState {
    full_text: String,
    is_streaming: bool,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new message, dropping anything left from a previous one.
    pub fn begin(&mut self) {
        self.full_text.clear();
        self.is_streaming = true;
    }

    /// Append a chunk and return the raw text so far.
    pub fn push_chunk(&mut self, chunk: &str) -> &str {
        self.full_text.push_str(chunk);
        &self.full_text
    }

    /// Stop streaming and return the full markdown-lite render.
    pub fn finish(&mut self) -> String {
        self.is_streaming = false;
        render_content(&self.full_text)
    }

    /// Throw away the partial message.
    pub fn discard(&mut self) {
        self.full_text.clear();
        self.is_streaming = false;
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }
}
