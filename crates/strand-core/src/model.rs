//! Model descriptors and reasoning levels.
//!
//! A [`Model`] identifies the endpoint a turn is sent to. The triple
//! `(provider, api, id)` is what the message normalizer compares against
//! each assistant message's provenance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Input modality accepted by a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Plain text.
    Text,
    /// Base64 images.
    Image,
}

/// Cost per million tokens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCost {
    /// Input tokens.
    pub input: f64,
    /// Output tokens.
    pub output: f64,
    /// Cache reads.
    pub cache_read: f64,
    /// Cache writes.
    pub cache_write: f64,
}

/// Model definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Provider-side model ID.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Wire API family (e.g. `anthropic-messages`).
    pub api: String,
    /// Provider (e.g. `anthropic`, `openrouter`).
    pub provider: String,
    /// Base URL of the endpoint.
    #[serde(default)]
    pub base_url: String,
    /// Whether the model supports reasoning output.
    #[serde(default)]
    pub reasoning: bool,
    /// Accepted input kinds.
    #[serde(default)]
    pub input: Vec<InputKind>,
    /// Pricing.
    #[serde(default)]
    pub cost: ModelCost,
    /// Context window in tokens.
    #[serde(default)]
    pub context_window: u64,
    /// Maximum output tokens.
    #[serde(default)]
    pub max_tokens: u64,
    /// Extra request headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl Model {
    /// Minimal model descriptor for the given endpoint identity.
    pub fn new(
        provider: impl Into<String>,
        api: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            api: api.into(),
            provider: provider.into(),
            base_url: String::new(),
            reasoning: false,
            input: vec![InputKind::Text],
            cost: ModelCost::default(),
            context_window: 0,
            max_tokens: 0,
            headers: None,
        }
    }

    /// Whether `(provider, api, model)` names this exact endpoint.
    #[must_use]
    pub fn is_same_endpoint(&self, provider: &str, api: &str, model: &str) -> bool {
        self.provider == provider && self.api == api && self.id == model
    }
}

/// Reasoning effort requested from the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    /// Reasoning disabled.
    #[default]
    Off,
    /// Minimal effort.
    Minimal,
    /// Low effort.
    Low,
    /// Medium effort.
    Medium,
    /// High effort.
    High,
    /// Extra-high effort (only some models).
    Xhigh,
}

impl ThinkingLevel {
    /// Parse a level name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Some(Self::Off),
            "minimal" => Some(Self::Minimal),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "xhigh" => Some(Self::Xhigh),
            _ => None,
        }
    }

    /// The level to request from a provider, or `None` when reasoning is off.
    #[must_use]
    pub fn as_reasoning(self) -> Option<Self> {
        (self != Self::Off).then_some(self)
    }
}

/// Token budgets per thinking level for token-budgeted providers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingBudgets {
    /// Budget for [`ThinkingLevel::Minimal`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimal: Option<u64>,
    /// Budget for [`ThinkingLevel::Low`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<u64>,
    /// Budget for [`ThinkingLevel::Medium`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<u64>,
    /// Budget for [`ThinkingLevel::High`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<u64>,
}
