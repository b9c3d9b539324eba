//! # Context Overflow Detection
//!
//! Recognizes assistant messages that failed (or silently degraded) because
//! the request exceeded the model's context window. Callers use this to
//! decide whether to compact history before retrying.

use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use strand_core::messages::{AssistantMessage, StopReason};

/// Error texts providers return for oversized prompts.
static OVERFLOW_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)prompt is too long",
        r"(?i)input is too long for requested model",
        r"(?i)exceeds the context window",
        r"(?i)input token count.*exceeds the maximum",
        r"(?i)maximum prompt length is \d+",
        r"(?i)reduce the length of the messages",
        r"(?i)maximum context length is \d+ tokens",
        r"(?i)exceeds the limit of \d+",
        r"(?i)exceeds the available context size",
        r"(?i)greater than the context length",
        r"(?i)context window exceeds limit",
        r"(?i)exceeded model token limit",
        r"(?i)context[_ ]length[_ ]exceeded",
        r"(?i)too many tokens",
        r"(?i)token limit exceeded",
    ])
    .unwrap_or_else(|_| RegexSet::empty())
});

/// Bare 400/413 responses some endpoints send for oversized requests.
static NO_BODY_STATUS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^4(00|13)\s*(status code)?\s*\(no body\)").ok());

/// Whether `message` indicates the context window was exceeded.
///
/// Two cases count:
/// - an `error` stop whose message matches a known overflow error;
/// - a `stop` whose reported input (including cache reads) exceeds
///   `context_window`, for endpoints that truncate silently.
#[must_use]
pub fn is_context_overflow(message: &AssistantMessage, context_window: Option<u64>) -> bool {
    if message.stop_reason == StopReason::Error {
        if let Some(error) = message.error_message.as_deref() {
            if OVERFLOW_PATTERNS.is_match(error) {
                return true;
            }
            if NO_BODY_STATUS.as_ref().is_some_and(|re| re.is_match(error)) {
                return true;
            }
        }
    }

    match context_window {
        Some(window) if window > 0 && message.stop_reason == StopReason::Stop => {
            message.usage.input + message.usage.cache_read > window
        }
        _ => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::model::Model;

    fn failed(text: &str) -> AssistantMessage {
        AssistantMessage::failure(&Model::new("p", "a", "m"), StopReason::Error, text)
    }

    #[test]
    fn patterns_compile() {
        assert_eq!(OVERFLOW_PATTERNS.len(), 15);
        assert!(NO_BODY_STATUS.is_some());
    }

    #[test]
    fn provider_error_texts() {
        for text in [
            "prompt is too long: 213462 tokens > 200000 maximum",
            "This model's maximum context length is 128000 tokens",
            "Your input exceeds the context window of this model",
            "The input token count (1200000) exceeds the maximum number of tokens allowed",
            "CONTEXT_LENGTH_EXCEEDED",
            "Too many tokens in request",
        ] {
            assert!(is_context_overflow(&failed(text), None), "{text}");
        }
    }

    #[test]
    fn no_body_status() {
        assert!(is_context_overflow(&failed("413 status code (no body)"), None));
        assert!(is_context_overflow(&failed("400 (no body)"), None));
        assert!(!is_context_overflow(&failed("500 (no body)"), None));
    }

    #[test]
    fn unrelated_error_is_not_overflow() {
        assert!(!is_context_overflow(&failed("rate limit exceeded"), Some(1000)));
    }

    #[test]
    fn pattern_only_counts_on_error_stop() {
        let mut msg = failed("prompt is too long");
        msg.stop_reason = StopReason::Aborted;
        assert!(!is_context_overflow(&msg, None));
    }

    #[test]
    fn silent_overflow_counts_cache_reads() {
        let mut msg = AssistantMessage::empty_for(&Model::new("p", "a", "m"));
        msg.usage.input = 600;
        msg.usage.cache_read = 500;
        assert!(is_context_overflow(&msg, Some(1000)));
        assert!(!is_context_overflow(&msg, Some(2000)));
        assert!(!is_context_overflow(&msg, None));
    }
}
