//! Event types for agent operation.
//!
//! Two event families:
//!
//! - **[`AssistantMessageEvent`]**: the per-turn streaming contract every
//!   provider adapter produces. Each non-terminal event carries the partial
//!   assistant message accumulated so far.
//! - **[`AgentEvent`]**: agent lifecycle events delivered to subscribers.
//!   `message_update` wraps the underlying streaming event verbatim so
//!   observers can render block by block.
//!
//! Ordering guarantees for one generation: `start`, then for each content
//! index `*_start`, zero or more `*_delta`, `*_end`, then exactly one
//! terminal `done` or `error`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::ToolCall;
use crate::messages::{AgentMessage, AssistantMessage, StopReason, ToolResultMessage};
use crate::tools::ToolOutcome;

// ─────────────────────────────────────────────────────────────────────────────
// Terminal reasons
// ─────────────────────────────────────────────────────────────────────────────

/// Successful terminal reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DoneReason {
    /// Natural stop.
    Stop,
    /// Output limit reached.
    Length,
    /// Tool calls requested.
    ToolUse,
}

impl From<DoneReason> for StopReason {
    fn from(r: DoneReason) -> Self {
        match r {
            DoneReason::Stop => Self::Stop,
            DoneReason::Length => Self::Length,
            DoneReason::ToolUse => Self::ToolUse,
        }
    }
}

/// Failed terminal reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorReason {
    /// Transport or provider failure.
    Error,
    /// Cancelled by the caller.
    Aborted,
}

impl From<ErrorReason> for StopReason {
    fn from(r: ErrorReason) -> Self {
        match r {
            ErrorReason::Error => Self::Error,
            ErrorReason::Aborted => Self::Aborted,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AssistantMessageEvent: per-turn streaming contract
// ─────────────────────────────────────────────────────────────────────────────

/// Events emitted while one assistant message is generated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssistantMessageEvent {
    /// Generation started.
    #[serde(rename = "start")]
    Start {
        /// Empty message carrying provenance.
        partial: AssistantMessage,
    },

    /// Text block started.
    #[serde(rename = "text_start")]
    TextStart {
        /// Content block index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Accumulated message.
        partial: AssistantMessage,
    },

    /// Incremental text.
    #[serde(rename = "text_delta")]
    TextDelta {
        /// Content block index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Text fragment.
        delta: String,
        /// Accumulated message.
        partial: AssistantMessage,
    },

    /// Text block completed.
    #[serde(rename = "text_end")]
    TextEnd {
        /// Content block index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Full block text.
        content: String,
        /// Accumulated message.
        partial: AssistantMessage,
    },

    /// Thinking block started.
    #[serde(rename = "thinking_start")]
    ThinkingStart {
        /// Content block index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Accumulated message.
        partial: AssistantMessage,
    },

    /// Incremental thinking.
    #[serde(rename = "thinking_delta")]
    ThinkingDelta {
        /// Content block index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Thinking fragment.
        delta: String,
        /// Accumulated message.
        partial: AssistantMessage,
    },

    /// Thinking block completed.
    #[serde(rename = "thinking_end")]
    ThinkingEnd {
        /// Content block index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Full thinking text.
        content: String,
        /// Accumulated message.
        partial: AssistantMessage,
    },

    /// Tool call block started.
    #[serde(rename = "toolcall_start")]
    ToolCallStart {
        /// Content block index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Accumulated message.
        partial: AssistantMessage,
    },

    /// Raw argument JSON fragment. `partial` holds the best-effort parse.
    #[serde(rename = "toolcall_delta")]
    ToolCallDelta {
        /// Content block index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Raw JSON fragment.
        delta: String,
        /// Accumulated message.
        partial: AssistantMessage,
    },

    /// Tool call fully constructed.
    #[serde(rename = "toolcall_end")]
    ToolCallEnd {
        /// Content block index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Final tool call.
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
        /// Accumulated message.
        partial: AssistantMessage,
    },

    /// Generation completed.
    #[serde(rename = "done")]
    Done {
        /// Why it stopped.
        reason: DoneReason,
        /// Final message.
        message: AssistantMessage,
    },

    /// Generation failed or was aborted.
    #[serde(rename = "error")]
    Error {
        /// Failure kind.
        reason: ErrorReason,
        /// Partial message with `stopReason` and `errorMessage` set.
        error: AssistantMessage,
    },
}

impl AssistantMessageEvent {
    /// The message snapshot this event carries.
    #[must_use]
    pub fn message(&self) -> &AssistantMessage {
        match self {
            Self::Start { partial }
            | Self::TextStart { partial, .. }
            | Self::TextDelta { partial, .. }
            | Self::TextEnd { partial, .. }
            | Self::ThinkingStart { partial, .. }
            | Self::ThinkingDelta { partial, .. }
            | Self::ThinkingEnd { partial, .. }
            | Self::ToolCallStart { partial, .. }
            | Self::ToolCallDelta { partial, .. }
            | Self::ToolCallEnd { partial, .. } => partial,
            Self::Done { message, .. } => message,
            Self::Error { error, .. } => error,
        }
    }

    /// Content block index, for block-level events.
    #[must_use]
    pub fn content_index(&self) -> Option<usize> {
        match self {
            Self::TextStart { content_index, .. }
            | Self::TextDelta { content_index, .. }
            | Self::TextEnd { content_index, .. }
            | Self::ThinkingStart { content_index, .. }
            | Self::ThinkingDelta { content_index, .. }
            | Self::ThinkingEnd { content_index, .. }
            | Self::ToolCallStart { content_index, .. }
            | Self::ToolCallDelta { content_index, .. }
            | Self::ToolCallEnd { content_index, .. } => Some(*content_index),
            Self::Start { .. } | Self::Done { .. } | Self::Error { .. } => None,
        }
    }

    /// Whether this is `done` or `error`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Consume a terminal event into its final message.
    #[must_use]
    pub fn into_final_message(self) -> Option<AssistantMessage> {
        match self {
            Self::Done { message, .. } => Some(message),
            Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Event type name as it appears on the wire.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::TextStart { .. } => "text_start",
            Self::TextDelta { .. } => "text_delta",
            Self::TextEnd { .. } => "text_end",
            Self::ThinkingStart { .. } => "thinking_start",
            Self::ThinkingDelta { .. } => "thinking_delta",
            Self::ThinkingEnd { .. } => "thinking_end",
            Self::ToolCallStart { .. } => "toolcall_start",
            Self::ToolCallDelta { .. } => "toolcall_delta",
            Self::ToolCallEnd { .. } => "toolcall_end",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentEvent: lifecycle events for subscribers
// ─────────────────────────────────────────────────────────────────────────────

/// Agent-level lifecycle events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    /// A run began.
    #[serde(rename = "agent_start")]
    AgentStart,

    /// A run finished.
    #[serde(rename = "agent_end")]
    AgentEnd {
        /// Messages appended during this run.
        messages: Vec<AgentMessage>,
    },

    /// A turn began.
    #[serde(rename = "turn_start")]
    TurnStart,

    /// A turn finished.
    #[serde(rename = "turn_end")]
    TurnEnd {
        /// The assistant message of the turn.
        message: AgentMessage,
        /// Tool results appended during the turn.
        #[serde(rename = "toolResults")]
        tool_results: Vec<ToolResultMessage>,
    },

    /// A message entered the history (or began streaming).
    #[serde(rename = "message_start")]
    MessageStart {
        /// The message.
        message: AgentMessage,
    },

    /// A streaming assistant message changed.
    #[serde(rename = "message_update")]
    MessageUpdate {
        /// Partial message.
        message: AgentMessage,
        /// The underlying streaming event.
        #[serde(rename = "assistantMessageEvent")]
        assistant_message_event: AssistantMessageEvent,
    },

    /// A message is final.
    #[serde(rename = "message_end")]
    MessageEnd {
        /// The message.
        message: AgentMessage,
    },

    /// A tool started executing.
    #[serde(rename = "tool_execution_start")]
    ToolExecutionStart {
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        #[serde(rename = "toolName")]
        tool_name: String,
        /// Call arguments.
        args: Map<String, Value>,
    },

    /// A tool reported partial output.
    #[serde(rename = "tool_execution_update")]
    ToolExecutionUpdate {
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        #[serde(rename = "toolName")]
        tool_name: String,
        /// Call arguments.
        args: Map<String, Value>,
        /// Partial output.
        #[serde(rename = "partialResult")]
        partial_result: ToolOutcome,
    },

    /// A tool finished.
    #[serde(rename = "tool_execution_end")]
    ToolExecutionEnd {
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        #[serde(rename = "toolName")]
        tool_name: String,
        /// Output (error text when `is_error`).
        result: ToolOutcome,
        /// Whether the tool failed.
        #[serde(rename = "isError")]
        is_error: bool,
    },
}

impl AgentEvent {
    /// Event type name as it appears on the wire.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AgentStart => "agent_start",
            Self::AgentEnd { .. } => "agent_end",
            Self::TurnStart => "turn_start",
            Self::TurnEnd { .. } => "turn_end",
            Self::MessageStart { .. } => "message_start",
            Self::MessageUpdate { .. } => "message_update",
            Self::MessageEnd { .. } => "message_end",
            Self::ToolExecutionStart { .. } => "tool_execution_start",
            Self::ToolExecutionUpdate { .. } => "tool_execution_update",
            Self::ToolExecutionEnd { .. } => "tool_execution_end",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use serde_json::json;

    fn partial() -> AssistantMessage {
        AssistantMessage::empty_for(&Model::new("p", "a", "m"))
    }

    #[test]
    fn stream_event_wire_shape() {
        let e = AssistantMessageEvent::TextDelta {
            content_index: 2,
            delta: "hi".into(),
            partial: partial(),
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "text_delta");
        assert_eq!(v["contentIndex"], 2);
        assert_eq!(v["delta"], "hi");
        assert_eq!(e.content_index(), Some(2));
        assert!(!e.is_terminal());
    }

    #[test]
    fn terminal_events_yield_message() {
        let done = AssistantMessageEvent::Done {
            reason: DoneReason::ToolUse,
            message: partial(),
        };
        assert!(done.is_terminal());
        assert_eq!(serde_json::to_value(&done).unwrap()["reason"], "toolUse");
        assert!(done.into_final_message().is_some());

        let err = AssistantMessageEvent::Error {
            reason: ErrorReason::Aborted,
            error: partial(),
        };
        assert_eq!(err.event_type(), "error");
        assert_eq!(serde_json::to_value(&err).unwrap()["reason"], "aborted");
    }

    #[test]
    fn reasons_map_to_stop_reason() {
        assert_eq!(StopReason::from(DoneReason::Length), StopReason::Length);
        assert_eq!(StopReason::from(ErrorReason::Aborted), StopReason::Aborted);
    }

    #[test]
    fn agent_event_wire_shape() {
        let e = AgentEvent::ToolExecutionEnd {
            tool_call_id: "c1".into(),
            tool_name: "bash".into(),
            result: ToolOutcome::text("ok"),
            is_error: false,
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "tool_execution_end");
        assert_eq!(v["toolCallId"], "c1");
        assert_eq!(v["isError"], false);
        assert_eq!(serde_json::to_value(AgentEvent::AgentStart).unwrap(), json!({"type": "agent_start"}));
    }

    #[test]
    fn message_update_carries_stream_event_verbatim() {
        let inner = AssistantMessageEvent::Start { partial: partial() };
        let e = AgentEvent::MessageUpdate {
            message: AgentMessage::Assistant(partial()),
            assistant_message_event: inner.clone(),
        };
        let back: AgentEvent = serde_json::from_value(serde_json::to_value(&e).unwrap()).unwrap();
        match back {
            AgentEvent::MessageUpdate { assistant_message_event, .. } => {
                assert_eq!(assistant_message_event, inner);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
