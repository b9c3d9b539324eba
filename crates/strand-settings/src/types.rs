//! Settings type definitions.
//!
//! Field names are camelCase on disk. Every struct is `#[serde(default)]`,
//! so a settings file only needs the keys it changes.

use serde::{Deserialize, Serialize};
use strand_core::logging::LogLevel;
use strand_core::model::{ThinkingBudgets, ThinkingLevel};

/// Root settings type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrandSettings {
    /// Settings schema version.
    pub version: String,
    /// Agent loop defaults.
    pub agent: AgentSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for StrandSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            agent: AgentSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// How many queued messages are drained at one injection point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueMode {
    /// Drain the whole queue.
    All,
    /// Drain only the oldest message.
    #[default]
    OneAtATime,
}

impl QueueMode {
    /// Parse `all` or `one-at-a-time`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "one-at-a-time" => Some(Self::OneAtATime),
            _ => None,
        }
    }
}

/// Defaults applied to new agents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Steering queue drain mode.
    pub steering_mode: QueueMode,
    /// Follow-up queue drain mode.
    pub follow_up_mode: QueueMode,
    /// Initial reasoning effort.
    pub thinking_level: ThinkingLevel,
    /// Token budgets per reasoning level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budgets: Option<ThinkingBudgets>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Output token limit per turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Upper bound for server-requested retry delays.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retry_delay_ms: Option<u64>,
    /// Session identifier forwarded to providers for caching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Logging configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level when `RUST_LOG` is unset.
    pub level: LogLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let s: StrandSettings = serde_json::from_str(r#"{"agent": {"steeringMode": "all"}}"#).unwrap();
        assert_eq!(s.agent.steering_mode, QueueMode::All);
        assert_eq!(s.agent.follow_up_mode, QueueMode::OneAtATime);
        assert_eq!(s.logging.level, LogLevel::Warn);
        assert_eq!(s.version, "0.1.0");
    }

    #[test]
    fn queue_mode_wire_names() {
        assert_eq!(serde_json::to_string(&QueueMode::OneAtATime).unwrap(), "\"one-at-a-time\"");
        assert_eq!(QueueMode::parse("all"), Some(QueueMode::All));
        assert_eq!(QueueMode::parse("ALL"), None);
    }

    #[test]
    fn optional_fields_are_omitted() {
        let json = serde_json::to_value(StrandSettings::default()).unwrap();
        assert!(json["agent"].get("temperature").is_none());
        assert_eq!(json["agent"]["thinkingLevel"], "off");
    }
}
