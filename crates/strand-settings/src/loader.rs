//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`StrandSettings::default()`]
//! 2. If `~/.strand/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `STRAND_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use strand_core::logging::LogLevel;
use strand_core::model::ThinkingLevel;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{QueueMode, StrandSettings};

/// Upper bound accepted for `STRAND_MAX_RETRY_DELAY_MS`.
pub const MAX_RETRY_DELAY_LIMIT_MS: u64 = 600_000;

/// Resolve the path to the settings file (`~/.strand/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".strand").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<StrandSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. A file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<StrandSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<StrandSettings> {
    let defaults = serde_json::to_value(StrandSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `STRAND_*` environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut StrandSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning and the file/default value stays.
pub fn apply_overrides(settings: &mut StrandSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Agent settings ──────────────────────────────────────────────
    if let Some(v) = read("STRAND_STEERING_MODE") {
        match QueueMode::parse(&v) {
            Some(mode) => settings.agent.steering_mode = mode,
            None => warn!(key = "STRAND_STEERING_MODE", value = %v, "invalid queue mode env var, ignoring"),
        }
    }
    if let Some(v) = read("STRAND_FOLLOW_UP_MODE") {
        match QueueMode::parse(&v) {
            Some(mode) => settings.agent.follow_up_mode = mode,
            None => warn!(key = "STRAND_FOLLOW_UP_MODE", value = %v, "invalid queue mode env var, ignoring"),
        }
    }
    if let Some(v) = read("STRAND_THINKING_LEVEL") {
        match ThinkingLevel::parse(&v) {
            Some(level) => settings.agent.thinking_level = level,
            None => warn!(key = "STRAND_THINKING_LEVEL", value = %v, "invalid thinking level env var, ignoring"),
        }
    }
    if let Some(v) = read("STRAND_MAX_RETRY_DELAY_MS") {
        match parse_u64_range(&v, 0, MAX_RETRY_DELAY_LIMIT_MS) {
            Some(ms) => settings.agent.max_retry_delay_ms = Some(ms),
            None => warn!(key = "STRAND_MAX_RETRY_DELAY_MS", value = %v, "invalid u64 env var, ignoring"),
        }
    }
    if let Some(v) = read("STRAND_SESSION_ID") {
        settings.agent.session_id = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("STRAND_LOG_LEVEL") {
        settings.logging.level = LogLevel::from_str_lossy(&v);
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
