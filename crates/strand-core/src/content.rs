//! Content block types.
//!
//! These are the primitive building blocks that appear inside messages.
//! Provider-private fields (`textSignature`, `thinkingSignature`,
//! `thoughtSignature`) are opaque to the core and only matter when a
//! history is replayed against the model that produced it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Text content block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    /// The text content.
    pub text: String,
    /// Provider-issued signature for the text block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_signature: Option<String>,
}

/// Thinking content block (model reasoning).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingContent {
    /// The thinking text.
    pub thinking: String,
    /// Provider-issued signature used to validate replayed reasoning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_signature: Option<String>,
}

/// Image content block (base64-encoded).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    /// Base64-encoded image data.
    pub data: String,
    /// MIME type (e.g. `image/png`).
    pub mime_type: String,
}

/// A tool invocation requested by the model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Provider-assigned call ID.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Arguments object. Empty while nothing has been parsed yet.
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Thought signature (Gemini models).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

/// Content that can appear in user and tool result messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UserContent {
    /// Text content.
    #[serde(rename = "text")]
    Text(TextContent),
    /// Image content.
    #[serde(rename = "image")]
    Image(ImageContent),
}

/// Content that can appear in assistant messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssistantContent {
    /// Text content.
    #[serde(rename = "text")]
    Text(TextContent),
    /// Thinking content.
    #[serde(rename = "thinking")]
    Thinking(ThinkingContent),
    /// Tool call content.
    #[serde(rename = "toolCall")]
    ToolCall(ToolCall),
}

// ─────────────────────────────────────────────────────────────────────────────
// Constructors and accessors
// ─────────────────────────────────────────────────────────────────────────────

impl TextContent {
    /// Create an unsigned text block.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            text_signature: None,
        }
    }
}

impl ThinkingContent {
    /// Create an unsigned thinking block.
    pub fn new(thinking: impl Into<String>) -> Self {
        Self {
            thinking: thinking.into(),
            thinking_signature: None,
        }
    }

    /// Create a signed thinking block.
    pub fn signed(thinking: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            thinking: thinking.into(),
            thinking_signature: Some(signature.into()),
        }
    }
}

impl ToolCall {
    /// Create a tool call with the given arguments.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            thought_signature: None,
        }
    }
}

impl UserContent {
    /// Create a text content block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextContent::new(text))
    }

    /// Create an image content block.
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image(ImageContent {
            data: data.into(),
            mime_type: mime_type.into(),
        })
    }

    /// Get the text if this is a text block.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(&t.text),
            Self::Image(_) => None,
        }
    }
}

impl AssistantContent {
    /// Create a text content block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextContent::new(text))
    }

    /// Create an unsigned thinking block.
    pub fn thinking(thinking: impl Into<String>) -> Self {
        Self::Thinking(ThinkingContent::new(thinking))
    }

    /// Get the tool call if this is a tool call block.
    #[must_use]
    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            Self::ToolCall(tc) => Some(tc),
            _ => None,
        }
    }

    /// Whether this block carries anything worth keeping.
    ///
    /// Whitespace-only text and thinking, and tool calls without a name,
    /// count as empty.
    #[must_use]
    pub fn has_substance(&self) -> bool {
        match self {
            Self::Text(t) => !t.text.trim().is_empty(),
            Self::Thinking(t) => !t.thinking.trim().is_empty(),
            Self::ToolCall(tc) => !tc.name.trim().is_empty(),
        }
    }
}

/// Concatenate the text blocks of user or tool-result content.
pub fn extract_text(content: &[UserContent]) -> String {
    content
        .iter()
        .filter_map(UserContent::as_text)
        .collect::<Vec<_>>()
        .join("")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assistant_content_wire_tags() {
        let blocks = vec![
            AssistantContent::text("hi"),
            AssistantContent::Thinking(ThinkingContent::signed("hmm", "sig")),
            AssistantContent::ToolCall(ToolCall::new("c1", "read", Map::new())),
        ];
        let v = serde_json::to_value(&blocks).unwrap();
        assert_eq!(v[0], json!({"type": "text", "text": "hi"}));
        assert_eq!(
            v[1],
            json!({"type": "thinking", "thinking": "hmm", "thinkingSignature": "sig"})
        );
        assert_eq!(
            v[2],
            json!({"type": "toolCall", "id": "c1", "name": "read", "arguments": {}})
        );
    }

    #[test]
    fn tool_call_arguments_default_to_empty_object() {
        let tc: ToolCall = serde_json::from_value(json!({"id": "a", "name": "b"})).unwrap();
        assert!(tc.arguments.is_empty());
    }

    #[test]
    fn image_uses_camel_case_mime_type() {
        let v = serde_json::to_value(UserContent::image("AAAA", "image/png")).unwrap();
        assert_eq!(v["mimeType"], "image/png");
        assert_eq!(v["type"], "image");
    }

    #[test]
    fn substance_ignores_whitespace() {
        assert!(!AssistantContent::text("  \n").has_substance());
        assert!(!AssistantContent::thinking("").has_substance());
        assert!(AssistantContent::text("x").has_substance());
        assert!(!AssistantContent::ToolCall(ToolCall::new("id", " ", Map::new())).has_substance());
    }

    #[test]
    fn extract_text_skips_images() {
        let content = vec![
            UserContent::text("a"),
            UserContent::image("AAAA", "image/png"),
            UserContent::text("b"),
        ];
        assert_eq!(extract_text(&content), "ab");
    }
}
