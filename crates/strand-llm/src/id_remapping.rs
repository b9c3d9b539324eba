//! # Tool Call ID Remapping
//!
//! When switching providers mid-session, tool call IDs from one provider
//! (e.g. `OpenAI`'s `call_abc|fc_123...`) may violate another provider's ID
//! syntax (Anthropic accepts `[A-Za-z0-9_-]{1,64}`, Mistral exactly nine
//! alphanumerics). This module rewrites IDs into a target syntax and keeps
//! a table so tool results follow their call to the new ID.

use std::collections::HashMap;

/// Maximum tool call ID length accepted by Anthropic-style endpoints.
pub const ANTHROPIC_MAX_ID_LEN: usize = 64;

/// Maximum tool call ID length accepted by `OpenAI`-style endpoints.
pub const OPENAI_MAX_ID_LEN: usize = 40;

/// Exact tool call ID length required by Mistral.
pub const MISTRAL_ID_LEN: usize = 9;

const MISTRAL_PADDING: &str = "ABCDEFGHI";

/// Tool call ID syntax required by a target endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdSyntax {
    /// `[A-Za-z0-9_-]`, at most 64 characters.
    Anthropic,
    /// Strip any `|item` suffix, then `[A-Za-z0-9_-]`, at most 40 characters.
    OpenAi,
    /// Exactly nine ASCII alphanumerics.
    Mistral,
}

impl IdSyntax {
    /// Rewrite `id` so it satisfies this syntax.
    ///
    /// IDs that already conform are returned unchanged.
    #[must_use]
    pub fn normalize(self, id: &str) -> String {
        match self {
            Self::Anthropic => sanitize(id, ANTHROPIC_MAX_ID_LEN),
            Self::OpenAi => {
                let call_id = id.split('|').next().unwrap_or(id);
                sanitize(call_id, OPENAI_MAX_ID_LEN)
            }
            Self::Mistral => {
                let mut out: String = id
                    .chars()
                    .filter(char::is_ascii_alphanumeric)
                    .take(MISTRAL_ID_LEN)
                    .collect();
                let missing = MISTRAL_ID_LEN - out.len();
                out.push_str(&MISTRAL_PADDING[..missing]);
                out
            }
        }
    }

    /// Whether `id` already satisfies this syntax.
    #[must_use]
    pub fn accepts(self, id: &str) -> bool {
        self.normalize(id) == id
    }
}

/// Replace characters outside `[A-Za-z0-9_-]` with `_` and truncate.
fn sanitize(id: &str, max_len: usize) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .take(max_len)
        .collect()
}

/// Original-to-rewritten tool call ID table.
///
/// Monotonic: once an original ID is recorded, later records for it are
/// ignored, so every reference resolves to the same rewritten ID.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdRemapTable {
    mapping: HashMap<String, String>,
}

impl IdRemapTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `original -> rewritten` unless `original` is already mapped.
    ///
    /// Returns the ID `original` resolves to after the call.
    pub fn record(&mut self, original: &str, rewritten: String) -> &str {
        self.mapping.entry(original.to_string()).or_insert(rewritten)
    }

    /// The rewritten ID for `id`, or `id` itself when it was never remapped.
    #[must_use]
    pub fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        remap_tool_call_id(id, &self.mapping)
    }

    /// Whether `id` has a recorded rewrite.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.mapping.contains_key(id)
    }

    /// Number of recorded rewrites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Whether nothing has been remapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Remap a tool call ID using a previously built mapping.
///
/// Returns the mapped ID if found, or the original ID unchanged.
pub fn remap_tool_call_id<'a, S: std::hash::BuildHasher>(
    id: &'a str,
    mapping: &'a HashMap<String, String, S>,
) -> &'a str {
    mapping.get(id).map_or(id, String::as_str)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
