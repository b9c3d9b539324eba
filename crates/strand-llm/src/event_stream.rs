//! # Event Stream Plumbing
//!
//! Adapters produce events from a background task and hand the consumer a
//! stream. [`event_channel`] connects the two. The sender enforces the
//! terminal-event rule: once `done` or `error` has been pushed, later
//! pushes are dropped and the stream ends.
//!
//! [`collect_message`] drains a stream to its final message, for callers
//! that want a completed response rather than incremental events.

use futures::StreamExt;
use strand_core::events::AssistantMessageEvent;
use strand_core::messages::AssistantMessage;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::provider::{AssistantEventStream, ProviderError, ProviderResult};

/// Producer half of an assistant event stream.
#[derive(Debug)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<AssistantMessageEvent>>,
}

impl EventSender {
    /// Push an event.
    ///
    /// Returns `false` when the event was dropped: the stream already ended
    /// or the consumer went away.
    pub fn push(&mut self, event: AssistantMessageEvent) -> bool {
        let Some(tx) = &self.tx else {
            debug!(event_type = event.event_type(), "event after terminal, dropping");
            return false;
        };
        let terminal = event.is_terminal();
        let delivered = tx.send(event).is_ok();
        if terminal {
            // Dropping the sender closes the stream after the terminal event.
            self.tx = None;
        }
        delivered
    }

    /// Whether a terminal event has been pushed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.tx.is_none()
    }

    /// Whether the consumer dropped the stream.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().is_none_or(mpsc::UnboundedSender::is_closed)
    }
}

/// Create a connected sender and stream.
pub fn event_channel() -> (EventSender, AssistantEventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSender { tx: Some(tx) },
        Box::pin(UnboundedReceiverStream::new(rx)),
    )
}

/// Drain `stream` and return the message carried by its terminal event.
///
/// Errors when the stream ends without a terminal event.
pub async fn collect_message(mut stream: AssistantEventStream) -> ProviderResult<AssistantMessage> {
    while let Some(event) = stream.next().await {
        if let Some(message) = event.into_final_message() {
            return Ok(message);
        }
    }
    Err(ProviderError::Stream {
        message: "stream ended without a terminal event".into(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
