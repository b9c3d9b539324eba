//! # Cross-Provider Message Normalization
//!
//! Rewrites a conversation history so it can be replayed against a target
//! model that may differ from the models that produced it.
//!
//! Two passes:
//!
//! 1. **Per-message rewrite.** Assistant messages from a different endpoint
//!    lose provider-private signatures, their thinking turns into plain text,
//!    and their tool call IDs are rewritten into the target's syntax. Every
//!    rewrite is recorded in an [`IdRemapTable`] so tool results that follow
//!    are pointed at the new ID.
//! 2. **Structural repair.** A forward scan drops failed assistant turns and
//!    answers every orphaned tool call with a synthetic error result.
//!
//! The rewrite must finish before the scan starts: only then do result IDs
//! and call IDs live in the same ID space.

use serde_json::Value;
use strand_core::content::{AssistantContent, TextContent, ToolCall, UserContent};
use strand_core::messages::{AssistantMessage, Message, ToolResultMessage};
use strand_core::model::Model;
use strand_core::now_ms;
use tracing::debug;

use crate::id_remapping::IdRemapTable;

/// Text of the synthetic result given to an unanswered tool call.
pub const ORPHAN_RESULT_TEXT: &str = "No result provided";

/// Rewrites a tool call ID for the target model.
///
/// Receives the original ID, the target model, and the assistant message
/// the call belongs to.
pub type IdRemapFn<'a> = dyn Fn(&str, &Model, &AssistantMessage) -> String + Send + Sync + 'a;

/// Normalize `messages` for replay against `target`.
///
/// Pure: no I/O, inputs are not modified.
pub fn normalize(messages: &[Message], target: &Model, id_remap: Option<&IdRemapFn<'_>>) -> Vec<Message> {
    let (rewritten, table) = rewrite_for_target(messages, target, id_remap);
    if !table.is_empty() {
        debug!(remapped = table.len(), target = %target.id, "remapped tool call ids");
    }
    repair_tool_flow(rewritten)
}

// ─────────────────────────────────────────────────────────────────────────────
// Pass 1: per-message rewrite
// ─────────────────────────────────────────────────────────────────────────────

/// Rewrite each message for `target`, returning the ID table built on the way.
pub fn rewrite_for_target(
    messages: &[Message],
    target: &Model,
    id_remap: Option<&IdRemapFn<'_>>,
) -> (Vec<Message>, IdRemapTable) {
    let mut table = IdRemapTable::new();
    let mut out = Vec::with_capacity(messages.len());

    for msg in messages {
        let rewritten = match msg {
            Message::User(_) => msg.clone(),
            Message::ToolResult(result) => {
                let resolved = table.resolve(&result.tool_call_id);
                if resolved == result.tool_call_id {
                    msg.clone()
                } else {
                    Message::ToolResult(ToolResultMessage {
                        tool_call_id: resolved.to_string(),
                        ..result.clone()
                    })
                }
            }
            Message::Assistant(assistant) => {
                Message::Assistant(rewrite_assistant(assistant, target, id_remap, &mut table))
            }
        };
        out.push(rewritten);
    }

    (out, table)
}

fn rewrite_assistant(
    msg: &AssistantMessage,
    target: &Model,
    id_remap: Option<&IdRemapFn<'_>>,
    table: &mut IdRemapTable,
) -> AssistantMessage {
    let same_origin = msg.is_from(target);
    let mut content = Vec::with_capacity(msg.content.len());

    for block in &msg.content {
        match block {
            AssistantContent::Thinking(t) => {
                if same_origin && t.thinking_signature.is_some() {
                    content.push(block.clone());
                } else if t.thinking.trim().is_empty() {
                    continue;
                } else if same_origin {
                    content.push(block.clone());
                } else {
                    content.push(AssistantContent::Text(TextContent::new(t.thinking.clone())));
                }
            }
            AssistantContent::Text(t) => {
                if same_origin {
                    content.push(block.clone());
                } else {
                    content.push(AssistantContent::Text(TextContent::new(t.text.clone())));
                }
            }
            AssistantContent::ToolCall(call) => {
                if same_origin {
                    content.push(block.clone());
                    continue;
                }
                let mut call = ToolCall {
                    thought_signature: None,
                    ..call.clone()
                };
                if let Some(remap) = id_remap {
                    let candidate = remap(&call.id, target, msg);
                    if candidate != call.id || table.contains(&call.id) {
                        call.id = table.record(&call.id, candidate).to_string();
                    }
                }
                content.push(AssistantContent::ToolCall(call));
            }
        }
    }

    AssistantMessage {
        content,
        ..msg.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pass 2: structural repair
// ─────────────────────────────────────────────────────────────────────────────

/// Drop failed assistant turns and answer orphaned tool calls.
pub fn repair_tool_flow(messages: Vec<Message>) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());
    let mut pending: Vec<ToolCall> = Vec::new();
    let mut answered: Vec<String> = Vec::new();

    for msg in messages {
        match msg {
            Message::Assistant(assistant) => {
                flush_orphans(&mut out, &mut pending, &mut answered);
                if assistant.stop_reason.is_failure() {
                    debug!(stop_reason = %assistant.stop_reason, "dropping failed assistant turn");
                    continue;
                }
                pending = assistant.tool_calls().cloned().collect();
                out.push(Message::Assistant(assistant));
            }
            Message::ToolResult(result) => {
                answered.push(result.tool_call_id.clone());
                out.push(Message::ToolResult(result));
            }
            Message::User(user) => {
                flush_orphans(&mut out, &mut pending, &mut answered);
                out.push(Message::User(user));
            }
        }
    }
    flush_orphans(&mut out, &mut pending, &mut answered);

    out
}

fn flush_orphans(out: &mut Vec<Message>, pending: &mut Vec<ToolCall>, answered: &mut Vec<String>) {
    for call in pending.drain(..) {
        if answered.iter().any(|id| *id == call.id) {
            continue;
        }
        debug!(tool_call_id = %call.id, tool_name = %call.name, "answering orphaned tool call");
        out.push(Message::ToolResult(ToolResultMessage {
            tool_call_id: call.id,
            tool_name: call.name,
            content: vec![UserContent::text(ORPHAN_RESULT_TEXT)],
            details: Value::Null,
            is_error: true,
            timestamp: now_ms(),
        }));
    }
    answered.clear();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
