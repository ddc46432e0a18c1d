//! The `send_message` entry point: UI state, request construction, and the
//! wiring from transport to reader to render/error sinks.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{ChatConfig, DeliveryMode};
use crate::error::ChatError;
use crate::events::{OutboundMessage, StreamEvent, StreamOutcome};
use crate::reader::StreamingResponseReader;
use crate::render::RenderState;
use crate::transport::Transport;
use crate::view::{ErrorSink, RenderSink, Role};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UiState {
    #[default]
    Idle,
    Sending,
}

/// What one `send_message` call ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing was sent and no state changed.
    Ignored,
    /// The assistant reply was rendered.
    Replied { text: String },
    /// The error was shown through the error sink.
    Failed { message: String },
}

/// Local `HH:MM` time for bubble timestamps.
pub fn local_timestamp() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

pub struct Dispatcher<T: Transport, R: RenderSink, E: ErrorSink> {
    transport: T,
    render: R,
    errors: E,
    endpoint: String,
    mode: DeliveryMode,
    idle_timeout: Option<Duration>,
    state: UiState,
    render_state: RenderState,
    session_id: Uuid,
    clock: fn() -> String,
}

impl<T: Transport, R: RenderSink, E: ErrorSink> Dispatcher<T, R, E> {
    pub fn new(transport: T, render: R, errors: E, config: &ChatConfig) -> Self {
        Dispatcher {
            transport,
            render,
            errors,
            endpoint: config.endpoint.clone(),
            mode: config.delivery_mode(),
            idle_timeout: config.idle_timeout(),
            state: UiState::Idle,
            render_state: RenderState::new(),
            session_id: Uuid::new_v4(),
            clock: local_timestamp,
        }
    }

    /// Replace the timestamp source used for bubbles.
    pub fn with_clock(mut self, clock: fn() -> String) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> UiState {
        self.state
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn render(&self) -> &R {
        &self.render
    }

    pub fn render_mut(&mut self) -> &mut R {
        &mut self.render
    }

    pub fn errors(&self) -> &E {
        &self.errors
    }

    pub fn render_state(&self) -> &RenderState {
        &self.render_state
    }

    pub fn into_parts(self) -> (T, R, E) {
        (self.transport, self.render, self.errors)
    }

    /// Send one user message and render the reply.
    ///
    /// Blank input is ignored without touching the network or the UI. For
    /// anything else the view goes to `sending` before the request and back
    /// to idle exactly once when the call ends, whichever way it ends,
    /// including when this future is dropped mid-stream.
    pub async fn send_message(&mut self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring blank message");
            return SendOutcome::Ignored;
        }
        let span = info_span!("send", session = %self.session_id, mode = %self.mode);
        self.dispatch(OutboundMessage::new(text))
            .instrument(span)
            .await
    }

    async fn dispatch(&mut self, message: OutboundMessage) -> SendOutcome {
        self.errors.clear_error();
        let now = (self.clock)();
        self.render.append_bubble(Role::User, &message.text, &now);
        info!(chars = message.text.chars().count(), "sending message");

        let mut sending = SendingGuard::enter(self);
        let outcome = match sending.mode {
            DeliveryMode::Streaming => sending.deliver_streaming(&message).await,
            DeliveryMode::OneShot => sending.deliver_one_shot(&message).await,
        };
        drop(sending);

        if let SendOutcome::Failed { message } = &outcome {
            warn!(error = %message, "send failed");
        }
        outcome
    }

    async fn deliver_streaming(&mut self, message: &OutboundMessage) -> SendOutcome {
        let clock = self.clock;
        let idle_timeout = self.idle_timeout;
        let Self {
            transport,
            render,
            errors,
            render_state,
            endpoint,
            ..
        } = self;

        render_state.begin();
        render.begin_stream();

        let stream = match transport.open_stream(endpoint, message).await {
            Ok(stream) => stream,
            Err(e) => {
                let shown = e.user_message();
                render_state.discard();
                render.discard_stream();
                errors.show_error(&shown);
                return SendOutcome::Failed { message: shown };
            }
        };

        let mut reader = StreamingResponseReader::new(|event: StreamEvent| match event {
            StreamEvent::Chunk { text } => {
                let so_far = render_state.push_chunk(&text);
                render.update_stream(so_far);
            }
            StreamEvent::Done => {
                let markup = render_state.finish();
                render.finish_stream(&markup, &clock());
            }
            StreamEvent::Error { message } => {
                render_state.discard();
                render.discard_stream();
                errors.show_error(&message);
            }
        })
        .with_idle_timeout(idle_timeout);

        let outcome = reader.read_stream(stream).await;
        drop(reader);

        match outcome {
            StreamOutcome::Done => SendOutcome::Replied {
                text: render_state.full_text().to_string(),
            },
            StreamOutcome::Error(message) => SendOutcome::Failed { message },
        }
    }

    async fn deliver_one_shot(&mut self, message: &OutboundMessage) -> SendOutcome {
        let response = match self.transport.post_message(&self.endpoint, message).await {
            Ok(response) => response,
            Err(e) => return self.fail(e.user_message()),
        };

        let success = response.is_success();
        let Some(body) = response.body else {
            let e = if success {
                ChatError::Body("expected a JSON reply".to_string())
            } else {
                ChatError::Http {
                    status: response.status,
                    message: None,
                }
            };
            return self.fail(e.user_message());
        };

        let server_error = body.error.filter(|e| !e.is_empty());
        if !success || server_error.is_some() {
            let shown = server_error.unwrap_or_else(|| format!("Error {}", response.status));
            return self.fail(shown);
        }

        match body.reply {
            Some(reply) => {
                let ts = body.ts.unwrap_or_else(self.clock);
                self.render.append_bubble(Role::Assistant, &reply, &ts);
                SendOutcome::Replied { text: reply }
            }
            None => {
                let e = ChatError::Body("reply field missing".to_string());
                self.fail(e.user_message())
            }
        }
    }

    fn fail(&mut self, message: String) -> SendOutcome {
        self.errors.show_error(&message);
        SendOutcome::Failed { message }
    }
}

/// Holds the dispatcher in the `Sending` state; dropping it returns to idle.
///
/// A reply still streaming at drop time (the send was cancelled) is
/// discarded first.
struct SendingGuard<'a, T: Transport, R: RenderSink, E: ErrorSink> {
    dispatcher: &'a mut Dispatcher<T, R, E>,
}

impl<'a, T: Transport, R: RenderSink, E: ErrorSink> SendingGuard<'a, T, R, E> {
    fn enter(dispatcher: &'a mut Dispatcher<T, R, E>) -> Self {
        dispatcher.state = UiState::Sending;
        dispatcher.render.set_sending(true);
        SendingGuard { dispatcher }
    }
}

impl<T: Transport, R: RenderSink, E: ErrorSink> Deref for SendingGuard<'_, T, R, E> {
    type Target = Dispatcher<T, R, E>;

    fn deref(&self) -> &Self::Target {
        self.dispatcher
    }
}

impl<T: Transport, R: RenderSink, E: ErrorSink> DerefMut for SendingGuard<'_, T, R, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dispatcher
    }
}

impl<T: Transport, R: RenderSink, E: ErrorSink> Drop for SendingGuard<'_, T, R, E> {
    fn drop(&mut self) {
        if self.dispatcher.render_state.is_streaming() {
            debug!("discarding reply abandoned mid-stream");
            self.dispatcher.render_state.discard();
            self.dispatcher.render.discard_stream();
        }
        self.dispatcher.state = UiState::Idle;
        self.dispatcher.render.set_sending(false);
    }
}
