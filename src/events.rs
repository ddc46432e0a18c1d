use serde::{Deserialize, Serialize};

// -- Outbound --------------------------------------------------------------

/// The body posted to both endpoint variants: `{"message": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "message")]
    pub text: String,
}

impl OutboundMessage {
    pub fn new(text: impl Into<String>) -> Self {
        OutboundMessage { text: text.into() }
    }
}

// -- Stream events ---------------------------------------------------------

/// One semantic event decoded from the SSE response.
///
/// A stream yields any number of `Chunk`s followed by exactly one terminal
/// event (`Done` or `Error`). Nothing follows the terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk { text: String },
    Done,
    Error { message: String },
}

impl StreamEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        StreamEvent::Chunk { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }
}

/// How a single stream ended, as seen by the caller of
/// [`crate::reader::StreamingResponseReader::read_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Done,
    Error(String),
}

// -- SSE wire record -------------------------------------------------------

/// The JSON payload of one `data: ...` record.
///
/// Every field is optional; the reader inspects `error`, then `chunk`, then
/// `done`. All three are kept as raw values so that a mistyped sibling never
/// hides a server error; `chunk` only counts when it is a string.
#[derive(Debug, Default, Deserialize)]
pub struct WireRecord {
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub chunk: Option<serde_json::Value>,
    #[serde(default)]
    pub done: Option<serde_json::Value>,
}

impl WireRecord {
    /// The error message, if this record carries a meaningful one.
    ///
    /// Null, `false` and empty strings do not count.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            serde_json::Value::Null | serde_json::Value::Bool(false) => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// The chunk text, if it is a non-empty string.
    pub fn chunk_text(&self) -> Option<&str> {
        self.chunk
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .filter(|c| !c.is_empty())
    }

    pub fn is_done(&self) -> bool {
        matches!(self.done, Some(serde_json::Value::Bool(true)))
    }
}

// -- One-shot response -----------------------------------------------------

/// The JSON body of a one-shot reply: `{"reply": ...}` or `{"error": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OneShotBody {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Server-side timestamp for the assistant bubble.
    #[serde(default)]
    pub ts: Option<String>,
}

/// Status plus (possibly undecodable) body of a one-shot response.
#[derive(Debug, Clone, PartialEq)]
pub struct OneShotResponse {
    pub status: u16,
    /// `None` when the body was not valid JSON of the expected shape.
    pub body: Option<OneShotBody>,
}

impl OneShotResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
