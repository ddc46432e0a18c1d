//! Crate-wide error type.

/// Errors surfaced by the transport, config loader, and CLI plumbing.
///
/// The streaming reader never returns these: every failure inside a stream
/// becomes a [`crate::events::StreamEvent::Error`]. `ChatError` covers what
/// happens before a stream exists (connecting, reading a one-shot body,
/// loading config).
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Connection, DNS, TLS, or mid-body read failure. Displays as the bare
    /// cause so callers can add their own prefix.
    #[error("{0}")]
    Network(String),
    /// The backend answered with a non-2xx status.
    ///
    /// `message` is the `error` field of the JSON body when one was present.
    #[error("HTTP {status}{}", http_suffix(.message))]
    Http { status: u16, message: Option<String> },
    /// A 2xx response whose body could not be decoded.
    #[error("invalid response body: {0}")]
    Body(String),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// The text shown to the user through the error sink.
    ///
    /// Always prefixed with `Network error:` except for config errors. An
    /// HTTP error body's `error` field stands in for the status as the cause.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Http {
                message: Some(message),
                ..
            } => format!("Network error: {message}"),
            ChatError::Http {
                status,
                message: None,
            } => format!("Network error: HTTP {status}"),
            ChatError::Network(cause) | ChatError::Body(cause) => {
                format!("Network error: {cause}")
            }
            ChatError::Config(cause) => cause.clone(),
            ChatError::Io(e) => format!("Network error: {e}"),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            ChatError::Http {
                status: status.as_u16(),
                message: None,
            }
        } else if e.is_decode() {
            ChatError::Body(e.to_string())
        } else {
            ChatError::Network(e.to_string())
        }
    }
}

fn http_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_with_server_message_is_a_network_error() {
        let e = ChatError::Http {
            status: 429,
            message: Some("rate limited".to_string()),
        };
        assert_eq!(e.user_message(), "Network error: rate limited");
        assert_eq!(e.to_string(), "HTTP 429: rate limited");
    }

    #[test]
    fn test_http_without_message_mentions_status() {
        let e = ChatError::Http {
            status: 502,
            message: None,
        };
        assert_eq!(e.user_message(), "Network error: HTTP 502");
        assert_eq!(e.to_string(), "HTTP 502");
    }

    #[test]
    fn test_network_error_carries_cause() {
        let e = ChatError::Network("connection refused".to_string());
        assert_eq!(e.user_message(), "Network error: connection refused");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let e: ChatError = io.into();
        assert!(matches!(e, ChatError::Io(_)));
        assert!(e.user_message().contains("pipe closed"));
    }
}
