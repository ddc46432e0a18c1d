//! HTTP transport for both delivery modes.

use std::pin::Pin;

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use crate::error::{ChatError, Result};
use crate::events::{OneShotBody, OneShotResponse, OutboundMessage};

/// Raw response body of a streaming request.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, ChatError>> + Send>>;

/// Issues the single outbound call of a send.
///
/// Implementations perform exactly one request per method call.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// POST `message` and return the response body as a byte stream.
    ///
    /// A non-2xx status is an `Err(ChatError::Http)`, carrying the body's
    /// `error` field when the server sent one.
    async fn open_stream(&self, endpoint: &str, message: &OutboundMessage) -> Result<ByteStream>;

    /// POST `message` and read a whole JSON reply.
    ///
    /// Non-2xx statuses are returned, not turned into errors; the caller
    /// decides what a failed status means.
    async fn post_message(
        &self,
        endpoint: &str,
        message: &OutboundMessage,
    ) -> Result<OneShotResponse>;
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        HttpTransport { client }
    }

    /// Ask the backend to forget the conversation history.
    pub async fn clear_history(&self, endpoint: &str) -> Result<()> {
        let response = self.client.post(endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Http {
                status: status.as_u16(),
                message: None,
            });
        }
        debug!(endpoint, "history cleared");
        Ok(())
    }
}

impl Transport for HttpTransport {
    async fn open_stream(&self, endpoint: &str, message: &OutboundMessage) -> Result<ByteStream> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Http {
                status: status.as_u16(),
                message: server_error(&body),
            });
        }

        debug!(endpoint, status = status.as_u16(), "stream opened");
        Ok(Box::pin(
            response.bytes_stream().map(|chunk| chunk.map_err(ChatError::from)),
        ))
    }

    async fn post_message(
        &self,
        endpoint: &str,
        message: &OutboundMessage,
    ) -> Result<OneShotResponse> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(message)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str::<OneShotBody>(&text).ok();
        if body.is_none() {
            debug!(status, bytes = text.len(), "reply body is not a JSON object");
        }
        Ok(OneShotResponse { status, body })
    }
}

/// The non-empty `error` field of a JSON error body, if any.
fn server_error(body: &str) -> Option<String> {
    serde_json::from_str::<OneShotBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.is_empty())
}
