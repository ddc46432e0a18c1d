//! Recording sinks and a scripted transport shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use bytes::Bytes;
use streamchat::error::{ChatError, Result};
use streamchat::events::OneShotResponse;
use streamchat::transport::ByteStream;
use streamchat::{ErrorSink, OutboundMessage, RenderSink, Role, Transport};
use tokio_stream::StreamExt;

pub fn fixed_clock() -> String {
    "10:00".to_string()
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Logs every render call as a short string, in call order.
#[derive(Debug, Default)]
pub struct RecordingView {
    pub log: Vec<String>,
}

impl RecordingView {
    pub fn count(&self, prefix: &str) -> usize {
        self.log.iter().filter(|l| l.starts_with(prefix)).count()
    }

    pub fn has(&self, entry: &str) -> bool {
        self.log.iter().any(|l| l == entry)
    }
}

impl RenderSink for RecordingView {
    fn set_sending(&mut self, sending: bool) {
        self.log.push(format!("sending:{sending}"));
    }

    fn append_bubble(&mut self, role: Role, text: &str, timestamp: &str) {
        self.log.push(format!("bubble:{role}:{text}@{timestamp}"));
    }

    fn begin_stream(&mut self) {
        self.log.push("begin".to_string());
    }

    fn update_stream(&mut self, raw_text: &str) {
        self.log.push(format!("update:{raw_text}"));
    }

    fn finish_stream(&mut self, markup: &str, timestamp: &str) {
        self.log.push(format!("finish:{markup}@{timestamp}"));
    }

    fn discard_stream(&mut self) {
        self.log.push("discard".to_string());
    }
}

#[derive(Debug, Default)]
pub struct RecordingErrors {
    pub shown: Vec<String>,
    pub cleared: usize,
}

impl ErrorSink for RecordingErrors {
    fn show_error(&mut self, message: &str) {
        self.shown.push(message.to_string());
    }

    fn clear_error(&mut self) {
        self.cleared += 1;
    }
}

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

pub enum Script {
    /// Stream these chunks, then end.
    Stream(Vec<std::result::Result<Bytes, ChatError>>),
    /// Stream these chunks, then hang forever.
    StreamThenHang(Vec<Bytes>),
    OpenFails(ChatError),
    Reply(OneShotResponse),
    ReplyFails(ChatError),
}

/// Plays back one [`Script`] and records every request it receives.
pub struct ScriptedTransport {
    script: Mutex<Option<Script>>,
    pub requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    pub fn new(script: Script) -> Self {
        ScriptedTransport {
            script: Mutex::new(Some(script)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn take(&self, endpoint: &str, message: &OutboundMessage) -> Script {
        self.requests
            .lock()
            .unwrap()
            .push((endpoint.to_string(), message.text.clone()));
        self.script
            .lock()
            .unwrap()
            .take()
            .expect("transport called more than once")
    }
}

impl Transport for ScriptedTransport {
    async fn open_stream(&self, endpoint: &str, message: &OutboundMessage) -> Result<ByteStream> {
        match self.take(endpoint, message) {
            Script::Stream(chunks) => Ok(Box::pin(tokio_stream::iter(chunks))),
            Script::StreamThenHang(chunks) => Ok(Box::pin(
                tokio_stream::iter(chunks.into_iter().map(Ok))
                    .chain(tokio_stream::pending()),
            )),
            Script::OpenFails(e) => Err(e),
            _ => panic!("streaming call against a one-shot script"),
        }
    }

    async fn post_message(
        &self,
        endpoint: &str,
        message: &OutboundMessage,
    ) -> Result<OneShotResponse> {
        match self.take(endpoint, message) {
            Script::Reply(response) => Ok(response),
            Script::ReplyFails(e) => Err(e),
            _ => panic!("one-shot call against a streaming script"),
        }
    }
}

pub fn sse(records: &[&str]) -> Vec<std::result::Result<Bytes, ChatError>> {
    records
        .iter()
        .map(|r| Ok(Bytes::from(format!("data: {r}\n\n"))))
        .collect()
}
