//! Chat client core: an incremental reader for SSE-framed reply streams and
//! the dispatcher that sends a message and routes the reply to a view.
//!
//! ```text
//! send_message ─▶ Transport ─▶ StreamingResponseReader ─▶ RenderSink / ErrorSink
//! ```

pub mod cli;
pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod reader;
pub mod render;
pub mod terminal;
pub mod transport;
pub mod view;

pub use config::{ChatConfig, DeliveryMode};
pub use dispatcher::{Dispatcher, SendOutcome, UiState};
pub use error::ChatError;
pub use events::{OutboundMessage, StreamEvent, StreamOutcome};
pub use reader::{EventSubscriber, StreamingResponseReader};
pub use render::{escape_html, render_content, RenderState};
pub use transport::{HttpTransport, Transport};
pub use view::{ErrorSink, RenderSink, Role};
