//! Message types.
//!
//! Two unions live here:
//!
//! - [`Message`]: the three roles an LLM endpoint understands (`user`,
//!   `assistant`, `toolResult`). This is what providers receive.
//! - [`AgentMessage`]: everything the agent keeps in its history, which adds
//!   an opaque [`CustomMessage`] variant for application-defined entries.
//!   A `convert_to_llm` hook maps these down to [`Message`] before each call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::{AssistantContent, ToolCall, UserContent};
use crate::model::Model;
use crate::now_ms;
use crate::tools::Tool;

// ─────────────────────────────────────────────────────────────────────────────
// Usage & stop reason
// ─────────────────────────────────────────────────────────────────────────────

/// Cost breakdown for a message, in dollars.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageCost {
    /// Input cost.
    pub input: f64,
    /// Output cost.
    pub output: f64,
    /// Cache read cost.
    pub cache_read: f64,
    /// Cache write cost.
    pub cache_write: f64,
    /// Total cost.
    pub total: f64,
}

/// Token usage for a single assistant message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Usage {
    /// Input tokens.
    pub input: u64,
    /// Output tokens.
    pub output: u64,
    /// Tokens read from the prompt cache.
    pub cache_read: u64,
    /// Tokens written to the prompt cache.
    pub cache_write: u64,
    /// Sum of all token counts.
    pub total_tokens: u64,
    /// Cost breakdown.
    pub cost: UsageCost,
}

/// Why an assistant message ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// Natural end of turn.
    #[default]
    Stop,
    /// Output token limit reached.
    Length,
    /// The model requested tool calls.
    ToolUse,
    /// Transport or provider failure.
    Error,
    /// Cancelled by the caller.
    Aborted,
}

impl StopReason {
    /// Whether this reason marks a turn that is not a valid replay unit.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Error | Self::Aborted)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolUse => "toolUse",
            Self::Error => "error",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message variants
// ─────────────────────────────────────────────────────────────────────────────

/// User message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    /// Text and image blocks.
    pub content: Vec<UserContent>,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
}

impl UserMessage {
    /// A single-block text message stamped now.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![UserContent::text(text)],
            timestamp: now_ms(),
        }
    }
}

/// Assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessage {
    /// Ordered content blocks.
    #[serde(default)]
    pub content: Vec<AssistantContent>,
    /// Wire API that produced this message.
    pub api: String,
    /// Provider that produced this message.
    pub provider: String,
    /// Model ID that produced this message.
    pub model: String,
    /// Token usage.
    #[serde(default)]
    pub usage: Usage,
    /// Why generation stopped.
    #[serde(default)]
    pub stop_reason: StopReason,
    /// Error text for `error`/`aborted` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
}

impl AssistantMessage {
    /// An empty message attributed to `model`, stamped now.
    pub fn empty_for(model: &Model) -> Self {
        Self {
            content: Vec::new(),
            api: model.api.clone(),
            provider: model.provider.clone(),
            model: model.id.clone(),
            usage: Usage::default(),
            stop_reason: StopReason::Stop,
            error_message: None,
            timestamp: now_ms(),
        }
    }

    /// A failed turn carrying `message` as its error text.
    pub fn failure(model: &Model, stop_reason: StopReason, message: impl Into<String>) -> Self {
        Self {
            stop_reason,
            error_message: Some(message.into()),
            ..Self::empty_for(model)
        }
    }

    /// Iterate over tool call blocks in order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.content.iter().filter_map(AssistantContent::as_tool_call)
    }

    /// Whether the message requests any tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls().next().is_some()
    }

    /// Concatenated text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Whether this message was produced by exactly `model`.
    #[must_use]
    pub fn is_from(&self, model: &Model) -> bool {
        model.is_same_endpoint(&self.provider, &self.api, &self.model)
    }
}

/// Tool result message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultMessage {
    /// ID of the tool call this answers.
    pub tool_call_id: String,
    /// Name of the tool that ran.
    pub tool_name: String,
    /// Text and image blocks.
    pub content: Vec<UserContent>,
    /// Opaque details for observers.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
    /// Whether the tool failed.
    #[serde(default)]
    pub is_error: bool,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
}

impl ToolResultMessage {
    /// An error result with a single text block.
    pub fn error(call: &ToolCall, text: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: vec![UserContent::text(text)],
            details: Value::Null,
            is_error: true,
            timestamp: now_ms(),
        }
    }
}

/// Application-defined message.
///
/// The core never sends these to a model. A `convert_to_llm` hook can map
/// recognized kinds to LLM messages and drop the rest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomMessage {
    /// Application tag (e.g. `notification`, `bash_execution`).
    pub kind: String,
    /// Arbitrary structured payload.
    #[serde(default)]
    pub payload: Value,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Unions
// ─────────────────────────────────────────────────────────────────────────────

/// A message as seen by an LLM endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Message {
    /// User turn.
    #[serde(rename = "user")]
    User(UserMessage),
    /// Assistant turn.
    #[serde(rename = "assistant")]
    Assistant(AssistantMessage),
    /// Tool result.
    #[serde(rename = "toolResult")]
    ToolResult(ToolResultMessage),
}

impl Message {
    /// Wire role name.
    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
            Self::ToolResult(_) => "toolResult",
        }
    }
}

/// A message in the agent's history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum AgentMessage {
    /// User turn.
    #[serde(rename = "user")]
    User(UserMessage),
    /// Assistant turn.
    #[serde(rename = "assistant")]
    Assistant(AssistantMessage),
    /// Tool result.
    #[serde(rename = "toolResult")]
    ToolResult(ToolResultMessage),
    /// Application-defined entry.
    #[serde(rename = "custom")]
    Custom(CustomMessage),
}

impl AgentMessage {
    /// A user text message stamped now.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::User(UserMessage::text(text))
    }

    /// Role name (`custom` for application entries).
    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
            Self::ToolResult(_) => "toolResult",
            Self::Custom(_) => "custom",
        }
    }

    /// Creation timestamp.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::User(m) => m.timestamp,
            Self::Assistant(m) => m.timestamp,
            Self::ToolResult(m) => m.timestamp,
            Self::Custom(m) => m.timestamp,
        }
    }

    /// The assistant message, if this is one.
    #[must_use]
    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            Self::Assistant(m) => Some(m),
            _ => None,
        }
    }

    /// The LLM message, or `None` for custom entries.
    #[must_use]
    pub fn to_llm(&self) -> Option<Message> {
        match self {
            Self::User(m) => Some(Message::User(m.clone())),
            Self::Assistant(m) => Some(Message::Assistant(m.clone())),
            Self::ToolResult(m) => Some(Message::ToolResult(m.clone())),
            Self::Custom(_) => None,
        }
    }
}

impl From<Message> for AgentMessage {
    fn from(m: Message) -> Self {
        match m {
            Message::User(m) => Self::User(m),
            Message::Assistant(m) => Self::Assistant(m),
            Message::ToolResult(m) => Self::ToolResult(m),
        }
    }
}

impl From<AssistantMessage> for AgentMessage {
    fn from(m: AssistantMessage) -> Self {
        Self::Assistant(m)
    }
}

impl From<ToolResultMessage> for AgentMessage {
    fn from(m: ToolResultMessage) -> Self {
        Self::ToolResult(m)
    }
}

impl From<UserMessage> for AgentMessage {
    fn from(m: UserMessage) -> Self {
        Self::User(m)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Context
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a provider needs for one request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// System prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Conversation history.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Tools offered to the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
