//! # Provider Registry
//!
//! Maps `(provider, api)` pairs to [`Provider`] implementations. A
//! registration without a provider name serves every provider speaking its
//! api, which is how `OpenAI`-compatible endpoints share one adapter. Exact
//! registrations win over wildcard ones.
//!
//! Each registration carries a source id so everything a plugin registered
//! can be removed in one call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use strand_core::messages::{AssistantMessage, Context};
use strand_core::model::Model;
use tracing::{debug, instrument};

use crate::event_stream::collect_message;
use crate::provider::{AssistantEventStream, Provider, ProviderError, ProviderResult, StreamOptions};

type RegistryKey = (Option<String>, String);

struct Registration {
    provider: Arc<dyn Provider>,
    source_id: Option<String>,
}

/// Thread-safe registry of provider adapters.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: RwLock<HashMap<RegistryKey, Registration>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its own `(provider, api)` key.
    ///
    /// Replaces any existing registration for the same key.
    pub fn register(&self, provider: Arc<dyn Provider>, source_id: Option<&str>) {
        let key = (provider.provider().map(str::to_owned), provider.api().to_owned());
        debug!(provider = ?key.0, api = %key.1, source_id, "provider registered");
        let _ = self.entries.write().insert(
            key,
            Registration {
                provider,
                source_id: source_id.map(str::to_owned),
            },
        );
    }

    /// Find the adapter serving `model`.
    pub fn resolve(&self, model: &Model) -> Option<Arc<dyn Provider>> {
        let entries = self.entries.read();
        entries
            .get(&(Some(model.provider.clone()), model.api.clone()))
            .or_else(|| entries.get(&(None, model.api.clone())))
            .map(|r| Arc::clone(&r.provider))
    }

    /// Remove every registration made with `source_id`. Returns how many.
    pub fn unregister_source(&self, source_id: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, r| r.source_id.as_deref() != Some(source_id));
        before - entries.len()
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Stream `model` through whichever adapter serves it.
    pub async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> ProviderResult<AssistantEventStream> {
        stream_with_registry(self, model, context, options).await
    }

    /// Stream `model` and wait for the final message.
    pub async fn complete(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> ProviderResult<AssistantMessage> {
        collect_message(self.stream(model, context, options).await?).await
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        let mut keys: Vec<_> = entries.keys().collect();
        keys.sort();
        f.debug_struct("ProviderRegistry").field("keys", &keys).finish()
    }
}

/// Resolve the adapter for `model` in `registry` and start a stream.
#[instrument(skip_all, fields(provider = %model.provider, api = %model.api, model = %model.id))]
pub async fn stream_with_registry(
    registry: &ProviderRegistry,
    model: &Model,
    context: &Context,
    options: &StreamOptions,
) -> ProviderResult<AssistantEventStream> {
    let provider = registry.resolve(model).ok_or_else(|| ProviderError::NoProvider {
        provider: model.provider.clone(),
        api: model.api.clone(),
    })?;
    stream_with_provider(provider.as_ref(), model, context, options).await
}

/// Start a stream on a specific adapter, checking it speaks the model's api.
///
/// When `options` carries an [`ApiKeyResolver`](crate::provider::ApiKeyResolver)
/// it is consulted here, right before the request, and the resolved key is
/// handed to the adapter as `api_key`.
pub async fn stream_with_provider(
    provider: &dyn Provider,
    model: &Model,
    context: &Context,
    options: &StreamOptions,
) -> ProviderResult<AssistantEventStream> {
    if provider.api() != model.api {
        return Err(ProviderError::ApiMismatch {
            expected: provider.api().to_owned(),
            actual: model.api.clone(),
        });
    }
    if options.cancel.is_cancelled() {
        return Err(ProviderError::Cancelled);
    }
    if options.api_key_resolver.is_none() {
        return provider.stream(model, context, options).await;
    }
    let resolved = StreamOptions {
        api_key: options.resolve_api_key(&model.provider).await,
        ..options.clone()
    };
    debug!(has_key = resolved.api_key.is_some(), "resolved api key");
    provider.stream(model, context, &resolved).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProvider, MockResponse};
    use crate::provider::ApiKeyResolver;
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    struct TokenResolver(Option<&'static str>);

    #[async_trait]
    impl ApiKeyResolver for TokenResolver {
        async fn resolve(&self, _provider: &str) -> Option<String> {
            self.0.map(String::from)
        }
    }

    fn mock(provider: Option<&str>, api: &str, text: &str) -> Arc<MockProvider> {
        Arc::new(MockProvider::with_endpoint(provider, api, vec![MockResponse::text(text)]))
    }

    #[tokio::test]
    async fn exact_registration_wins_over_wildcard() {
        let registry = ProviderRegistry::new();
        registry.register(mock(None, "openai-completions", "generic"), None);
        registry.register(mock(Some("groq"), "openai-completions", "groq"), None);

        let groq = Model::new("groq", "openai-completions", "llama");
        let msg = registry.complete(&groq, &Context::default(), &StreamOptions::default()).await.unwrap();
        assert_eq!(msg.text(), "groq");

        let other = Model::new("together", "openai-completions", "qwen");
        let msg = registry.complete(&other, &Context::default(), &StreamOptions::default()).await.unwrap();
        assert_eq!(msg.text(), "generic");
    }

    #[tokio::test]
    async fn unknown_endpoint_is_no_provider() {
        let registry = ProviderRegistry::new();
        let model = Model::new("acme", "acme-chat", "m");
        let result = registry.stream(&model, &Context::default(), &StreamOptions::default()).await;
        assert_matches!(result.err(), Some(ProviderError::NoProvider { provider, .. }) if provider == "acme");
    }

    #[tokio::test]
    async fn api_mismatch_is_rejected() {
        let provider = mock(Some("anthropic"), "anthropic-messages", "x");
        let model = Model::new("anthropic", "openai-responses", "m");
        let result =
            stream_with_provider(provider.as_ref(), &model, &Context::default(), &StreamOptions::default()).await;
        assert_matches!(result.err(), Some(ProviderError::ApiMismatch { .. }));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let provider = mock(Some("p"), "a", "x");
        let opts = StreamOptions::default();
        opts.cancel.cancel();
        let result = stream_with_provider(provider.as_ref(), &Model::new("p", "a", "m"), &Context::default(), &opts).await;
        assert_matches!(result.err(), Some(ProviderError::Cancelled));
    }

    #[tokio::test]
    async fn resolver_key_reaches_the_adapter() {
        let provider = mock(Some("p"), "a", "x");
        let opts = StreamOptions {
            api_key: Some("static".into()),
            api_key_resolver: Some(Arc::new(TokenResolver(Some("fresh")))),
            ..StreamOptions::default()
        };
        let model = Model::new("p", "a", "m");
        let _ = stream_with_provider(provider.as_ref(), &model, &Context::default(), &opts).await.unwrap();
        assert_eq!(provider.api_keys(), [Some("fresh".to_string())]);
    }

    #[tokio::test]
    async fn static_key_is_kept_when_resolver_declines() {
        let provider = mock(Some("p"), "a", "x");
        let opts = StreamOptions {
            api_key: Some("static".into()),
            api_key_resolver: Some(Arc::new(TokenResolver(None))),
            ..StreamOptions::default()
        };
        let model = Model::new("p", "a", "m");
        let _ = stream_with_provider(provider.as_ref(), &model, &Context::default(), &opts).await.unwrap();
        assert_eq!(provider.api_keys(), [Some("static".to_string())]);
    }

    #[test]
    fn unregister_by_source() {
        let registry = ProviderRegistry::new();
        registry.register(mock(Some("a"), "x", ""), Some("plugin"));
        registry.register(mock(Some("b"), "x", ""), Some("plugin"));
        registry.register(mock(Some("c"), "x", ""), None);
        assert_eq!(registry.unregister_source("plugin"), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve(&Model::new("a", "x", "m")).is_none());
        registry.clear();
        assert!(registry.is_empty());
    }
}
