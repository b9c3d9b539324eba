//! # Message Accumulator
//!
//! Provider adapters translate wire chunks into calls on a
//! [`MessageAccumulator`], which owns the partial [`AssistantMessage`] and
//! returns the [`AssistantMessageEvent`] to emit for each step. Every event
//! carries a snapshot of the message as accumulated so far, so consumers
//! never reconstruct state themselves.
//!
//! Block methods take the content index returned by the matching `*_start`.
//! A mismatched index (wrong block kind or out of range) returns `None` and
//! leaves the message untouched.

use std::collections::HashMap;

use serde_json::Map;
use strand_core::content::{AssistantContent, TextContent, ThinkingContent, ToolCall};
use strand_core::events::{AssistantMessageEvent, DoneReason, ErrorReason};
use strand_core::messages::{AssistantMessage, Usage};
use strand_core::model::Model;
use tracing::debug;

use crate::partial_json::parse_streaming_arguments;
use crate::tool_parsing::{ToolCallContext, parse_tool_call_arguments};

/// Builds one assistant message from streamed blocks.
#[derive(Clone, Debug)]
pub struct MessageAccumulator {
    partial: AssistantMessage,
    /// Raw argument text per tool call block index.
    raw_args: HashMap<usize, String>,
}

impl MessageAccumulator {
    /// Start accumulating a message attributed to `model`.
    pub fn new(model: &Model) -> Self {
        Self {
            partial: AssistantMessage::empty_for(model),
            raw_args: HashMap::new(),
        }
    }

    /// The message accumulated so far.
    #[must_use]
    pub fn partial(&self) -> &AssistantMessage {
        &self.partial
    }

    /// The `start` event.
    #[must_use]
    pub fn start(&self) -> AssistantMessageEvent {
        AssistantMessageEvent::Start {
            partial: self.partial.clone(),
        }
    }

    /// Record token usage reported by the provider.
    pub fn set_usage(&mut self, usage: Usage) {
        self.partial.usage = usage;
    }

    // ── Text ─────────────────────────────────────────────────────────────

    /// Open a text block. Returns its index and the `text_start` event.
    pub fn text_start(&mut self) -> (usize, AssistantMessageEvent) {
        let index = self.push(AssistantContent::Text(TextContent::new("")));
        let event = AssistantMessageEvent::TextStart {
            content_index: index,
            partial: self.partial.clone(),
        };
        (index, event)
    }

    /// Append text to block `index`.
    pub fn text_delta(&mut self, index: usize, delta: &str) -> Option<AssistantMessageEvent> {
        let Some(AssistantContent::Text(block)) = self.partial.content.get_mut(index) else {
            return None;
        };
        block.text.push_str(delta);
        Some(AssistantMessageEvent::TextDelta {
            content_index: index,
            delta: delta.to_string(),
            partial: self.partial.clone(),
        })
    }

    /// Close text block `index`, attaching an optional signature.
    pub fn text_end(&mut self, index: usize, signature: Option<String>) -> Option<AssistantMessageEvent> {
        let Some(AssistantContent::Text(block)) = self.partial.content.get_mut(index) else {
            return None;
        };
        if signature.is_some() {
            block.text_signature = signature;
        }
        let content = block.text.clone();
        Some(AssistantMessageEvent::TextEnd {
            content_index: index,
            content,
            partial: self.partial.clone(),
        })
    }

    // ── Thinking ─────────────────────────────────────────────────────────

    /// Open a thinking block. Returns its index and the `thinking_start` event.
    pub fn thinking_start(&mut self) -> (usize, AssistantMessageEvent) {
        let index = self.push(AssistantContent::Thinking(ThinkingContent::new("")));
        let event = AssistantMessageEvent::ThinkingStart {
            content_index: index,
            partial: self.partial.clone(),
        };
        (index, event)
    }

    /// Append reasoning text to block `index`.
    pub fn thinking_delta(&mut self, index: usize, delta: &str) -> Option<AssistantMessageEvent> {
        let Some(AssistantContent::Thinking(block)) = self.partial.content.get_mut(index) else {
            return None;
        };
        block.thinking.push_str(delta);
        Some(AssistantMessageEvent::ThinkingDelta {
            content_index: index,
            delta: delta.to_string(),
            partial: self.partial.clone(),
        })
    }

    /// Close thinking block `index`, attaching an optional signature.
    pub fn thinking_end(&mut self, index: usize, signature: Option<String>) -> Option<AssistantMessageEvent> {
        let Some(AssistantContent::Thinking(block)) = self.partial.content.get_mut(index) else {
            return None;
        };
        if signature.is_some() {
            block.thinking_signature = signature;
        }
        let content = block.thinking.clone();
        Some(AssistantMessageEvent::ThinkingEnd {
            content_index: index,
            content,
            partial: self.partial.clone(),
        })
    }

    // ── Tool calls ───────────────────────────────────────────────────────

    /// Open a tool call block. Returns its index and the `toolcall_start` event.
    pub fn tool_call_start(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> (usize, AssistantMessageEvent) {
        let call = ToolCall::new(id, name, Map::new());
        let index = self.push(AssistantContent::ToolCall(call));
        let _ = self.raw_args.insert(index, String::new());
        let event = AssistantMessageEvent::ToolCallStart {
            content_index: index,
            partial: self.partial.clone(),
        };
        (index, event)
    }

    /// Append a raw argument fragment to block `index`.
    ///
    /// The partial message holds the best-effort parse of everything
    /// received so far.
    pub fn tool_call_delta(&mut self, index: usize, delta: &str) -> Option<AssistantMessageEvent> {
        let Some(AssistantContent::ToolCall(call)) = self.partial.content.get_mut(index) else {
            return None;
        };
        let raw = self.raw_args.entry(index).or_default();
        raw.push_str(delta);
        call.arguments = parse_streaming_arguments(raw);
        Some(AssistantMessageEvent::ToolCallDelta {
            content_index: index,
            delta: delta.to_string(),
            partial: self.partial.clone(),
        })
    }

    /// Close tool call block `index` with the final argument parse.
    pub fn tool_call_end(&mut self, index: usize) -> Option<AssistantMessageEvent> {
        let provider = self.partial.provider.clone();
        let Some(AssistantContent::ToolCall(call)) = self.partial.content.get_mut(index) else {
            return None;
        };
        let raw = self.raw_args.remove(&index).unwrap_or_default();
        call.arguments = parse_tool_call_arguments(
            &raw,
            ToolCallContext {
                tool_call_id: Some(&call.id),
                tool_name: Some(&call.name),
                provider: Some(&provider),
            },
        );
        let tool_call = call.clone();
        Some(AssistantMessageEvent::ToolCallEnd {
            content_index: index,
            tool_call,
            partial: self.partial.clone(),
        })
    }

    /// Attach a provider signature to tool call block `index`.
    pub fn set_thought_signature(&mut self, index: usize, signature: impl Into<String>) {
        if let Some(AssistantContent::ToolCall(call)) = self.partial.content.get_mut(index) {
            call.thought_signature = Some(signature.into());
        }
    }

    // ── Terminal ─────────────────────────────────────────────────────────

    /// Finish successfully.
    #[must_use]
    pub fn done(mut self, reason: DoneReason) -> AssistantMessageEvent {
        self.partial.stop_reason = reason.into();
        AssistantMessageEvent::Done {
            reason,
            message: self.partial,
        }
    }

    /// Finish with a failure, keeping whatever content arrived.
    #[must_use]
    pub fn error(mut self, reason: ErrorReason, message: impl Into<String>) -> AssistantMessageEvent {
        let message = message.into();
        debug!(reason = ?reason, error = %message, blocks = self.partial.content.len(), "stream ended in error");
        self.partial.stop_reason = reason.into();
        self.partial.error_message = Some(message);
        AssistantMessageEvent::Error {
            reason,
            error: self.partial,
        }
    }

    fn push(&mut self, block: AssistantContent) -> usize {
        self.partial.content.push(block);
        self.partial.content.len() - 1
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use strand_core::messages::StopReason;

    fn acc() -> MessageAccumulator {
        MessageAccumulator::new(&Model::new("anthropic", "anthropic-messages", "claude"))
    }

    #[test]
    fn text_block_accumulates() {
        let mut acc = acc();
        let (idx, _) = acc.text_start();
        let _ = acc.text_delta(idx, "Hel").unwrap();
        let event = acc.text_delta(idx, "lo").unwrap();
        assert_eq!(event.message().text(), "Hello");
        assert_matches!(
            acc.text_end(idx, Some("sig".into())),
            Some(AssistantMessageEvent::TextEnd { content, .. }) if content == "Hello"
        );
        let AssistantContent::Text(block) = &acc.partial().content[0] else {
            panic!("expected text");
        };
        assert_eq!(block.text_signature.as_deref(), Some("sig"));
    }

    #[test]
    fn thinking_keeps_signature() {
        let mut acc = acc();
        let (idx, _) = acc.thinking_start();
        let _ = acc.thinking_delta(idx, "hmm");
        let _ = acc.thinking_end(idx, Some("opaque".into()));
        assert_eq!(
            acc.partial().content[0],
            AssistantContent::Thinking(ThinkingContent::signed("hmm", "opaque"))
        );
    }

    #[test]
    fn wrong_block_kind_is_rejected() {
        let mut acc = acc();
        let (idx, _) = acc.thinking_start();
        assert!(acc.text_delta(idx, "x").is_none());
        assert!(acc.tool_call_end(idx).is_none());
        assert!(acc.text_delta(7, "x").is_none());
    }

    #[test]
    fn tool_call_deltas_expose_partial_arguments() {
        let mut acc = acc();
        let (idx, _) = acc.tool_call_start("toolu_1", "write");
        let event = acc.tool_call_delta(idx, r#"{"path": "/tmp/a", "con"#).unwrap();
        let call = event.message().tool_calls().next().unwrap();
        assert_eq!(call.arguments.get("path"), Some(&json!("/tmp/a")));
        assert!(!call.arguments.contains_key("con"));

        let _ = acc.tool_call_delta(idx, r#"tent": "hi"}"#);
        let end = acc.tool_call_end(idx).unwrap();
        assert_matches!(
            end,
            AssistantMessageEvent::ToolCallEnd { tool_call, content_index: 0, .. }
                if tool_call.arguments.get("content") == Some(&json!("hi"))
        );
    }

    #[test]
    fn deeply_nested_argument_stream_is_survived() {
        let mut acc = acc();
        let (idx, _) = acc.tool_call_start("toolu_1", "write");
        for _ in 0..10 {
            let _ = acc.tool_call_delta(idx, &r#"{"a":"#.repeat(1_000));
        }
        let end = acc.tool_call_end(idx).unwrap();
        let AssistantMessageEvent::ToolCallEnd { tool_call, .. } = end else {
            panic!("expected toolcall_end");
        };
        assert!(tool_call.arguments.is_empty());
    }

    #[test]
    fn tool_call_without_arguments_is_empty_object() {
        let mut acc = acc();
        let (idx, _) = acc.tool_call_start("toolu_1", "now");
        let end = acc.tool_call_end(idx).unwrap();
        let AssistantMessageEvent::ToolCallEnd { tool_call, .. } = end else {
            panic!("expected toolcall_end");
        };
        assert!(tool_call.arguments.is_empty());
    }

    #[test]
    fn indices_follow_block_order() {
        let mut acc = acc();
        let (a, _) = acc.thinking_start();
        let (b, _) = acc.text_start();
        let (c, _) = acc.tool_call_start("t", "x");
        assert_eq!((a, b, c), (0, 1, 2));
    }

    #[test]
    fn done_sets_stop_reason() {
        let mut acc = acc();
        let (idx, _) = acc.tool_call_start("t", "x");
        let _ = acc.tool_call_end(idx);
        let msg = acc.done(DoneReason::ToolUse).into_final_message().unwrap();
        assert_eq!(msg.stop_reason, StopReason::ToolUse);
        assert!(msg.has_tool_calls());
    }

    #[test]
    fn error_keeps_partial_content() {
        let mut acc = acc();
        let (idx, _) = acc.text_start();
        let _ = acc.text_delta(idx, "half");
        let event = acc.error(ErrorReason::Aborted, "Request was aborted");
        let AssistantMessageEvent::Error { reason, error } = event else {
            panic!("expected error");
        };
        assert_eq!(reason, ErrorReason::Aborted);
        assert_eq!(error.stop_reason, StopReason::Aborted);
        assert_eq!(error.text(), "half");
        assert_eq!(error.error_message.as_deref(), Some("Request was aborted"));
    }
}
