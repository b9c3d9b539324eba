//! Stream processor: consumes one provider stream and mirrors it as
//! `message_*` agent events.
//!
//! Always produces a final [`AssistantMessage`]. A cancelled or truncated
//! stream becomes an `aborted` or `error` message built from the last
//! partial, so whatever content arrived is kept.

use futures::StreamExt;
use strand_core::events::{AgentEvent, AssistantMessageEvent};
use strand_core::messages::{AgentMessage, AssistantMessage, StopReason};
use strand_core::model::Model;
use strand_llm::AssistantEventStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Error text recorded when the run is aborted mid-stream.
pub const ABORTED_TEXT: &str = "Request was aborted";

/// Error text recorded when a stream ends without `done` or `error`.
pub const TRUNCATED_TEXT: &str = "Stream ended without a terminal event";

/// Drain `stream`, emitting `message_start`/`message_update`/`message_end`.
pub async fn process_stream(
    mut stream: AssistantEventStream,
    model: &Model,
    cancel: &CancellationToken,
    emit: &(dyn Fn(AgentEvent) + Send + Sync),
) -> AssistantMessage {
    let mut started = false;
    let mut partial: Option<AssistantMessage> = None;
    let mut updates = 0usize;

    loop {
        // biased: prefer cancellation when both a stream event and cancel are ready
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(updates, "stream cancelled");
                let message = close_partial(partial, model, StopReason::Aborted, ABORTED_TEXT);
                finish(&message, started, emit);
                return message;
            }
            event = stream.next() => event,
        };

        let Some(event) = event else {
            warn!(updates, "stream ended without terminal event");
            let message = close_partial(partial, model, StopReason::Error, TRUNCATED_TEXT);
            finish(&message, started, emit);
            return message;
        };

        match event {
            AssistantMessageEvent::Start { partial: p } => {
                if !started {
                    started = true;
                    emit(AgentEvent::MessageStart {
                        message: AgentMessage::Assistant(p.clone()),
                    });
                }
                partial = Some(p);
            }
            event if event.is_terminal() => {
                let Some(message) = event.into_final_message() else {
                    continue;
                };
                debug!(updates, stop_reason = %message.stop_reason, "stream finished");
                finish(&message, started, emit);
                return message;
            }
            event => {
                let snapshot = event.message().clone();
                if !started {
                    started = true;
                    emit(AgentEvent::MessageStart {
                        message: AgentMessage::Assistant(snapshot.clone()),
                    });
                }
                updates += 1;
                partial = Some(snapshot.clone());
                emit(AgentEvent::MessageUpdate {
                    message: AgentMessage::Assistant(snapshot),
                    assistant_message_event: event,
                });
            }
        }
    }
}

fn close_partial(partial: Option<AssistantMessage>, model: &Model, reason: StopReason, text: &str) -> AssistantMessage {
    let mut message = partial.unwrap_or_else(|| AssistantMessage::empty_for(model));
    message.stop_reason = reason;
    message.error_message = Some(text.to_owned());
    message
}

fn finish(message: &AssistantMessage, started: bool, emit: &(dyn Fn(AgentEvent) + Send + Sync)) {
    if !started {
        emit(AgentEvent::MessageStart {
            message: AgentMessage::Assistant(message.clone()),
        });
    }
    emit(AgentEvent::MessageEnd {
        message: AgentMessage::Assistant(message.clone()),
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use strand_core::events::DoneReason;
    use strand_llm::MessageAccumulator;

    fn model() -> Model {
        Model::new("mock", "mock", "mock-model")
    }

    fn recorder() -> (Arc<Mutex<Vec<AgentEvent>>>, impl Fn(AgentEvent) + Send + Sync) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (events, move |e| sink.lock().push(e))
    }

    fn types(events: &[AgentEvent]) -> Vec<&'static str> {
        events.iter().map(AgentEvent::event_type).collect()
    }

    fn stream_of(events: Vec<AssistantMessageEvent>) -> AssistantEventStream {
        Box::pin(futures::stream::iter(events))
    }

    fn text_events(text: &str) -> Vec<AssistantMessageEvent> {
        let mut acc = MessageAccumulator::new(&model());
        let mut out = vec![acc.start()];
        let (idx, ev) = acc.text_start();
        out.push(ev);
        out.extend(acc.text_delta(idx, text));
        out.extend(acc.text_end(idx, None));
        out.push(acc.done(DoneReason::Stop));
        out
    }

    // ── Normal completion ──

    #[tokio::test]
    async fn mirrors_stream_as_message_events() {
        let (events, emit) = recorder();
        let msg = process_stream(stream_of(text_events("hello")), &model(), &CancellationToken::new(), &emit).await;
        assert_eq!(msg.text(), "hello");
        assert_eq!(msg.stop_reason, StopReason::Stop);
        assert_eq!(
            types(&events.lock()),
            ["message_start", "message_update", "message_update", "message_update", "message_end"]
        );
    }

    #[tokio::test]
    async fn missing_start_is_synthesized() {
        let (events, emit) = recorder();
        let mut evs = text_events("x");
        let _ = evs.remove(0);
        let _ = process_stream(stream_of(evs), &model(), &CancellationToken::new(), &emit).await;
        let events = events.lock();
        assert_eq!(events[0].event_type(), "message_start");
        assert_eq!(events.last().map(AgentEvent::event_type), Some("message_end"));
    }

    // ── Failure paths ──

    #[tokio::test]
    async fn truncated_stream_is_error_with_partial() {
        let (events, emit) = recorder();
        let mut evs = text_events("partial");
        let _ = evs.pop();
        let msg = process_stream(stream_of(evs), &model(), &CancellationToken::new(), &emit).await;
        assert_eq!(msg.stop_reason, StopReason::Error);
        assert_eq!(msg.error_message.as_deref(), Some(TRUNCATED_TEXT));
        assert_eq!(msg.text(), "partial");
        assert_eq!(events.lock().last().map(AgentEvent::event_type), Some("message_end"));
    }

    #[tokio::test]
    async fn empty_stream_still_emits_start_and_end() {
        let (events, emit) = recorder();
        let msg = process_stream(stream_of(Vec::new()), &model(), &CancellationToken::new(), &emit).await;
        assert_eq!(msg.stop_reason, StopReason::Error);
        assert_eq!(types(&events.lock()), ["message_start", "message_end"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_keeps_partial_content() {
        let (events, emit) = recorder();
        let head = text_events("so far");
        let head_len = head.len() - 1;
        let stream = futures::stream::iter(head.into_iter().take(head_len))
            .chain(futures::stream::pending());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let _ = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });
        let msg = process_stream(Box::pin(stream), &model(), &cancel, &emit).await;
        assert_eq!(msg.stop_reason, StopReason::Aborted);
        assert_eq!(msg.error_message.as_deref(), Some(ABORTED_TEXT));
        assert_eq!(msg.text(), "so far");
        assert_eq!(events.lock().last().map(AgentEvent::event_type), Some("message_end"));
    }
}
