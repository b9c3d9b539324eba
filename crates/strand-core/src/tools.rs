//! Tool declaration and outcome types.
//!
//! [`Tool`] is what the model is told about a tool. [`ToolOutcome`] is what a
//! tool returns on success. Failures are carried separately so success and
//! error can never be mixed in one value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::UserContent;

/// Tool definition sent to the LLM.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (unique within a toolset).
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

/// Successful tool output.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Text and image blocks shown to the model.
    pub content: Vec<UserContent>,
    /// Opaque details for observers (UI, logs).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl ToolOutcome {
    /// A single text block with no details.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![UserContent::text(text)],
            details: Value::Null,
        }
    }

    /// Attach observer details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_serde_roundtrip() {
        let tool = Tool {
            name: "read".into(),
            description: "Read a file".into(),
            parameters: json!({"type": "object", "properties": {"path": {"type": "string"}}}),
        };
        let back: Tool = serde_json::from_str(&serde_json::to_string(&tool).unwrap()).unwrap();
        assert_eq!(back, tool);
    }

    #[test]
    fn outcome_with_details() {
        let o = ToolOutcome::text("ok").with_details(json!({"bytes": 3}));
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["content"][0]["text"], "ok");
        assert_eq!(v["details"]["bytes"], 3);
    }

    #[test]
    fn outcome_omits_null_details() {
        let v = serde_json::to_value(ToolOutcome::text("ok")).unwrap();
        assert!(v.get("details").is_none());
    }
}
