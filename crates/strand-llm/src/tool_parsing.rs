//! # Tool Call Argument Parsing
//!
//! Final parse of a tool call's accumulated argument text once the provider
//! closes the call. Strict JSON is tried first. When that fails, the tolerant
//! partial parser recovers whatever it can, since truncated calls (a
//! `length` stop mid-arguments) are common and the executor's validation will
//! report what is missing.

use serde_json::{Map, Value};
use tracing::warn;

use crate::partial_json::parse_streaming_arguments;

/// Context for logging when tool call parsing fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct ToolCallContext<'a> {
    /// The tool call ID (for correlation).
    pub tool_call_id: Option<&'a str>,
    /// The tool name.
    pub tool_name: Option<&'a str>,
    /// The provider that generated this tool call.
    pub provider: Option<&'a str>,
}

/// Parse accumulated tool call arguments into an object.
///
/// Never fails: non-object JSON yields an empty map, malformed JSON yields
/// the best partial recovery.
pub fn parse_tool_call_arguments(args: &str, context: ToolCallContext<'_>) -> Map<String, Value> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(
                tool_call_id = context.tool_call_id,
                tool_name = context.tool_name,
                provider = context.provider,
                parsed_type = other.to_string().chars().take(20).collect::<String>(),
                "tool call arguments parsed as non-object, using empty object"
            );
            Map::new()
        }
        Err(e) => {
            let recovered = parse_streaming_arguments(trimmed);
            warn!(
                tool_call_id = context.tool_call_id,
                tool_name = context.tool_name,
                provider = context.provider,
                error = %e,
                recovered_fields = recovered.len(),
                args_preview = trimmed.chars().take(100).collect::<String>(),
                "malformed tool call arguments, using partial recovery"
            );
            recovered
        }
    }
}

/// Whether `args` is strict JSON that parses to an object.
///
/// Empty input counts as valid empty arguments.
pub fn is_valid_tool_call_arguments(args: &str) -> bool {
    let trimmed = args.trim();
    trimmed.is_empty() || matches!(serde_json::from_str::<Value>(trimmed), Ok(Value::Object(_)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
