//! Incremental reader for `data: <json>\n\n` framed chat streams.
//!
//! [`StreamingResponseReader`] accepts bytes in whatever pieces the transport
//! delivers them, reassembles records, and hands [`StreamEvent`]s to a single
//! subscriber in record order. Every stream produces exactly one terminal
//! event: either one carried by the data (`done` / `error`), or one the
//! reader synthesizes when the transport ends, fails, or stalls.

use std::fmt::Display;
use std::time::Duration;

use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::decoder::Utf8Decoder;
use crate::events::{StreamEvent, StreamOutcome, WireRecord};

/// Record prefix; segments without it are keep-alives or comments.
pub const DATA_PREFIX: &str = "data: ";
/// Record separator.
pub const RECORD_SEPARATOR: &str = "\n\n";
/// Message of the synthesized error when input ends without a terminal record.
pub const UNEXPECTED_END: &str = "stream ended unexpectedly";

/// Receives the events of one stream.
pub trait EventSubscriber {
    fn on_event(&mut self, event: StreamEvent);
}

impl<F: FnMut(StreamEvent)> EventSubscriber for F {
    fn on_event(&mut self, event: StreamEvent) {
        self(event)
    }
}

pub struct StreamingResponseReader<S: EventSubscriber> {
    subscriber: S,
    decoder: Utf8Decoder,
    buffer: String,
    outcome: Option<StreamOutcome>,
    idle_timeout: Option<Duration>,
}

impl<S: EventSubscriber> StreamingResponseReader<S> {
    pub fn new(subscriber: S) -> Self {
        StreamingResponseReader {
            subscriber,
            decoder: Utf8Decoder::new(),
            buffer: String::new(),
            outcome: None,
            idle_timeout: None,
        }
    }

    /// Give up with an `Error` event when no bytes arrive for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn is_terminated(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&StreamOutcome> {
        self.outcome.as_ref()
    }

    pub fn into_subscriber(self) -> S {
        self.subscriber
    }

    // -----------------------------------------------------------------------
    // Push interface
    // -----------------------------------------------------------------------

    /// Feed one transport chunk. Returns `false` once the stream has
    /// terminated; further input is ignored.
    pub fn feed(&mut self, bytes: &[u8]) -> bool {
        if self.is_terminated() {
            return false;
        }
        let text = self.decoder.decode(bytes);
        self.buffer.push_str(&text);
        self.drain_records();
        !self.is_terminated()
    }

    /// Signal end of input from the transport.
    ///
    /// Any unterminated trailing segment is dropped. If no terminal record
    /// was seen, an `Error` with [`UNEXPECTED_END`] is emitted.
    pub fn finish(&mut self) {
        if self.is_terminated() {
            return;
        }
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);
        if !self.buffer.trim().is_empty() {
            debug!(
                bytes = self.buffer.len(),
                "discarding unterminated trailing segment"
            );
        }
        self.buffer.clear();
        warn!("stream ended without a terminal record");
        self.emit(StreamEvent::error(UNEXPECTED_END));
    }

    /// Terminate the stream with `message` unless it already terminated.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.is_terminated() {
            return;
        }
        self.buffer.clear();
        self.emit(StreamEvent::error(message));
    }

    // -----------------------------------------------------------------------
    // Pull driver
    // -----------------------------------------------------------------------

    /// Drive the reader from a transport stream until a terminal event.
    ///
    /// Read errors become `Error("Network error: <cause>")`; a stall longer
    /// than the idle timeout becomes `Error("stream idle for <n>s")`. The
    /// stream is dropped as soon as a terminal event is emitted, which
    /// closes the underlying connection.
    pub async fn read_stream<St, B, E>(&mut self, mut stream: St) -> StreamOutcome
    where
        St: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Display,
    {
        while !self.is_terminated() {
            let next = match self.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(secs = limit.as_secs(), "stream stalled");
                        self.fail(format!("stream idle for {}s", limit.as_secs()));
                        break;
                    }
                },
                None => stream.next().await,
            };

            match next {
                Some(Ok(bytes)) => {
                    self.feed(bytes.as_ref());
                }
                Some(Err(e)) => {
                    warn!(error = %e, "stream read failed");
                    self.fail(format!("Network error: {e}"));
                }
                None => self.finish(),
            }
        }

        self.outcome
            .clone()
            .unwrap_or_else(|| StreamOutcome::Error(UNEXPECTED_END.to_string()))
    }

    // -----------------------------------------------------------------------
    // Framing
    // -----------------------------------------------------------------------

    fn drain_records(&mut self) {
        while let Some(end) = self.buffer.find(RECORD_SEPARATOR) {
            let segment = self.buffer[..end].to_string();
            self.buffer.drain(..end + RECORD_SEPARATOR.len());
            self.process_segment(&segment);
            if self.is_terminated() {
                // Nothing after a terminal record is read.
                self.buffer.clear();
                return;
            }
        }
    }

    fn process_segment(&mut self, segment: &str) {
        let trimmed = segment.trim();
        let Some(payload) = trimmed.strip_prefix(DATA_PREFIX) else {
            if !trimmed.is_empty() {
                debug!(segment = trimmed, "skipping non-data segment");
            }
            return;
        };

        let record: WireRecord = match serde_json::from_str(payload) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "dropping malformed record");
                return;
            }
        };

        if let Some(message) = record.error_message() {
            self.emit(StreamEvent::Error { message });
            return;
        }
        if let Some(text) = record.chunk_text() {
            self.emit(StreamEvent::chunk(text));
        }
        if record.is_done() {
            self.emit(StreamEvent::Done);
        }
    }

    fn emit(&mut self, event: StreamEvent) {
        match &event {
            StreamEvent::Done => self.outcome = Some(StreamOutcome::Done),
            StreamEvent::Error { message } => {
                self.outcome = Some(StreamOutcome::Error(message.clone()))
            }
            StreamEvent::Chunk { .. } => {}
        }
        self.subscriber.on_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(chunks: &[&[u8]]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let mut reader = StreamingResponseReader::new(|e: StreamEvent| events.push(e));
        for chunk in chunks {
            reader.feed(chunk);
        }
        reader.finish();
        drop(reader);
        events
    }

    #[test]
    fn test_three_reads_hello() {
        let events = run(&[
            b"data: {\"chunk\":\"Hel\"}\n\n",
            b"data: {\"chunk\":\"lo\"}\n\n",
            b"data: {\"done\":true}\n\n",
        ]);
        assert_eq!(
            events,
            vec![
                StreamEvent::chunk("Hel"),
                StreamEvent::chunk("lo"),
                StreamEvent::Done
            ]
        );
    }

    #[test]
    fn test_split_inside_record() {
        let events = run(&[b"data: {\"chu", b"nk\":\"X\"}\n\n", b"data: {\"done\":true}\n\n"]);
        assert_eq!(events, vec![StreamEvent::chunk("X"), StreamEvent::Done]);
    }

    #[test]
    fn test_split_inside_separator() {
        let events = run(&[b"data: {\"chunk\":\"a\"}\n", b"\ndata: {\"done\":true}\n\n"]);
        assert_eq!(events, vec![StreamEvent::chunk("a"), StreamEvent::Done]);
    }

    #[test]
    fn test_error_halts_rest_of_buffer() {
        let events = run(&[
            b"data: {\"error\":\"rate limited\"}\n\ndata: {\"chunk\":\"late\"}\n\n",
        ]);
        assert_eq!(events, vec![StreamEvent::error("rate limited")]);
    }

    #[test]
    fn test_done_halts_rest_of_buffer() {
        let events = run(&[b"data: {\"done\":true}\n\ndata: {\"chunk\":\"late\"}\n\n"]);
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn test_feed_after_terminal_is_ignored() {
        let mut events = Vec::new();
        let mut reader = StreamingResponseReader::new(|e: StreamEvent| events.push(e));
        assert!(!reader.feed(b"data: {\"done\":true}\n\n"));
        assert!(!reader.feed(b"data: {\"chunk\":\"x\"}\n\n"));
        reader.finish();
        reader.fail("ignored");
        drop(reader);
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn test_end_without_terminal_synthesizes_error() {
        let events = run(&[b"data: {\"chunk\":\"partial\"}\n\n"]);
        assert_eq!(
            events,
            vec![StreamEvent::chunk("partial"), StreamEvent::error(UNEXPECTED_END)]
        );
    }

    #[test]
    fn test_unterminated_trailing_record_is_dropped() {
        let events = run(&[b"data: {\"done\":true}"]);
        assert_eq!(events, vec![StreamEvent::error(UNEXPECTED_END)]);
    }

    #[test]
    fn test_keepalive_and_garbage_skipped() {
        let events = run(&[
            b": ping\n\ndata: not json\n\ndata: {\"chunk\":\"ok\"}\n\nevent: x\n\ndata: {\"done\":true}\n\n",
        ]);
        assert_eq!(events, vec![StreamEvent::chunk("ok"), StreamEvent::Done]);
    }

    #[test]
    fn test_chunk_and_done_in_one_record() {
        let events = run(&[b"data: {\"chunk\":\"last\",\"done\":true}\n\n"]);
        assert_eq!(events, vec![StreamEvent::chunk("last"), StreamEvent::Done]);
    }

    #[test]
    fn test_error_wins_over_chunk_in_same_record() {
        let events = run(&[b"data: {\"chunk\":\"x\",\"error\":\"boom\"}\n\n"]);
        assert_eq!(events, vec![StreamEvent::error("boom")]);
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let events = run(&[b"\n  data: {\"chunk\":\"a\"}  \n\ndata: {\"done\":true}\n\n"]);
        assert_eq!(events, vec![StreamEvent::chunk("a"), StreamEvent::Done]);
    }

    #[test]
    fn test_fail_emits_single_error() {
        let mut events = Vec::new();
        let mut reader = StreamingResponseReader::new(|e: StreamEvent| events.push(e));
        reader.feed(b"data: {\"chunk\":\"a\"}\n\n");
        reader.fail("Network error: reset");
        reader.fail("again");
        reader.finish();
        assert_eq!(
            reader.outcome(),
            Some(&StreamOutcome::Error("Network error: reset".to_string()))
        );
        drop(reader);
        assert_eq!(
            events,
            vec![StreamEvent::chunk("a"), StreamEvent::error("Network error: reset")]
        );
    }

    #[tokio::test]
    async fn test_read_stream_done() {
        let chunks: Vec<Result<&[u8], String>> = vec![
            Ok(&b"data: {\"chunk\":\"hi\"}\n\n"[..]),
            Ok(&b"data: {\"done\":true}\n\n"[..]),
        ];
        let mut events = Vec::new();
        let mut reader = StreamingResponseReader::new(|e: StreamEvent| events.push(e));
        let outcome = reader.read_stream(tokio_stream::iter(chunks)).await;
        assert_eq!(outcome, StreamOutcome::Done);
        drop(reader);
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_read_stream_transport_error() {
        let chunks: Vec<Result<&[u8], String>> = vec![
            Ok(&b"data: {\"chunk\":\"hi\"}\n\n"[..]),
            Err("connection reset".to_string()),
            Ok(&b"data: {\"done\":true}\n\n"[..]),
        ];
        let mut reader = StreamingResponseReader::new(|_: StreamEvent| {});
        let outcome = reader.read_stream(tokio_stream::iter(chunks)).await;
        assert_eq!(
            outcome,
            StreamOutcome::Error("Network error: connection reset".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_stream_idle_timeout() {
        let stream = tokio_stream::pending::<Result<Vec<u8>, String>>();
        let mut reader =
            StreamingResponseReader::new(|_: StreamEvent| {}).with_idle_timeout(Some(Duration::from_secs(5)));
        let outcome = reader.read_stream(stream).await;
        assert_eq!(outcome, StreamOutcome::Error("stream idle for 5s".to_string()));
    }
}
