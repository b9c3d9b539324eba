//! # Provider Trait
//!
//! Core abstraction for LLM backends. Every provider family implements
//! [`Provider`] to expose one streaming interface: given a model and a
//! context, produce a stream of [`AssistantMessageEvent`]s that ends with
//! exactly one `done` or `error` event.
//!
//! Transport failures that happen after the stream has started are reported
//! in-band through the terminal `error` event. [`ProviderError`] is for
//! failures that prevent a stream from being produced at all.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use strand_core::events::AssistantMessageEvent;
use strand_core::messages::Context;
use strand_core::model::{Model, ThinkingBudgets, ThinkingLevel};
use tokio_util::sync::CancellationToken;

use crate::id_remapping::IdSyntax;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Boxed stream of [`AssistantMessageEvent`]s returned by [`Provider::stream`].
pub type AssistantEventStream = Pin<Box<dyn Stream<Item = AssistantMessageEvent> + Send>>;

/// Errors that prevent a provider stream from being produced.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No provider registered for the model's endpoint.
    #[error("No provider registered for {provider}/{api}")]
    NoProvider {
        /// Provider identifier.
        provider: String,
        /// Wire API identifier.
        api: String,
    },

    /// A provider was asked to serve a model speaking a different API.
    #[error("Mismatched api: {actual} expected {expected}")]
    ApiMismatch {
        /// API the provider speaks.
        expected: String,
        /// API the model declares.
        actual: String,
    },

    /// Authentication failed (expired token, missing key, etc.).
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited by the provider.
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: u64,
        /// Error description.
        message: String,
    },

    /// Provider returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// The event stream broke its contract.
    #[error("Stream error: {message}")]
    Stream {
        /// Error description.
        message: String,
    },

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request was cancelled before the stream started.
    #[error("Request was aborted")]
    Cancelled,

    /// Provider-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ProviderError {
    /// Whether a caller could reasonably retry.
    ///
    /// The core never retries on its own; this is for callers that do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::NoProvider { .. }
            | Self::ApiMismatch { .. }
            | Self::Auth { .. }
            | Self::Stream { .. }
            | Self::Json(_)
            | Self::Cancelled
            | Self::Other { .. } => false,
        }
    }

    /// Extract retry-after delay in milliseconds, if available.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }

    /// Error category string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NoProvider { .. } | Self::ApiMismatch { .. } => "configuration",
            Self::Auth { .. } => "auth",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api { .. } => "api",
            Self::Stream { .. } | Self::Json(_) => "parse",
            Self::Cancelled => "cancelled",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Resolves API keys lazily, right before each request.
///
/// Used for short-lived credentials (OAuth tokens) that may expire during
/// a long tool-use loop.
#[async_trait]
pub trait ApiKeyResolver: Send + Sync {
    /// Return a key for `provider`, or `None` to fall back to the static key.
    async fn resolve(&self, provider: &str) -> Option<String>;
}

/// Options for a provider stream request.
#[derive(Clone, Default)]
pub struct StreamOptions {
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u64>,
    /// Static API key.
    pub api_key: Option<String>,
    /// Lazy key resolver, consulted before `api_key`.
    pub api_key_resolver: Option<Arc<dyn ApiKeyResolver>>,
    /// Session identifier for provider-side caching.
    pub session_id: Option<String>,
    /// Extra request headers.
    pub headers: HashMap<String, String>,
    /// Reasoning effort, `None` when reasoning is off.
    pub reasoning: Option<ThinkingLevel>,
    /// Token budgets per reasoning level.
    pub thinking_budgets: Option<ThinkingBudgets>,
    /// Upper bound for server-requested retry delays.
    pub max_retry_delay_ms: Option<u64>,
    /// Cancellation signal for the whole request.
    pub cancel: CancellationToken,
}

impl StreamOptions {
    /// Resolve the API key for `provider`.
    ///
    /// The resolver wins when it returns a key; otherwise the static key is used.
    pub async fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(resolver) = &self.api_key_resolver {
            if let Some(key) = resolver.resolve(provider).await {
                return Some(key);
            }
        }
        self.api_key.clone()
    }
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_resolver", &self.api_key_resolver.is_some())
            .field("session_id", &self.session_id)
            .field("reasoning", &self.reasoning)
            .field("max_retry_delay_ms", &self.max_retry_delay_ms)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Core LLM provider trait.
///
/// Implementors must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider identifier this implementation serves (e.g. `"anthropic"`).
    ///
    /// `None` means it serves every provider speaking [`api`](Provider::api),
    /// as `OpenAI`-compatible endpoints do.
    fn provider(&self) -> Option<&str>;

    /// Wire API identifier (e.g. `"anthropic-messages"`).
    fn api(&self) -> &str;

    /// Tool call ID syntax the endpoint enforces for `model`, if any.
    ///
    /// When set, cross-origin tool call IDs are rewritten into this syntax
    /// before the history is sent.
    fn tool_call_id_syntax(&self, _model: &Model) -> Option<IdSyntax> {
        None
    }

    /// Stream a response from the LLM.
    ///
    /// The stream must end with exactly one terminal event. Cancelling
    /// `options.cancel` should end it with an `aborted` error event.
    async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> ProviderResult<AssistantEventStream>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
