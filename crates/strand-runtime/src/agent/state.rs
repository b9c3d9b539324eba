//! Agent state and construction options.

use std::collections::HashSet;
use std::sync::Arc;

use strand_core::messages::AgentMessage;
use strand_core::model::{Model, ThinkingBudgets, ThinkingLevel};
use strand_llm::{ApiKeyResolver, ProviderRegistry};
use strand_settings::{QueueMode, StrandSettings};

use crate::agent::hooks::{ConvertToLlm, DefaultConvertToLlm, TransformContext};
use crate::tools::AgentTool;

/// Observable agent state.
///
/// Updated by the agent as events are generated, before listeners see them.
#[derive(Clone)]
pub struct AgentState {
    /// System prompt sent with every request.
    pub system_prompt: String,
    /// Model used for the next turn.
    pub model: Model,
    /// Reasoning effort for the next turn.
    pub thinking_level: ThinkingLevel,
    /// Tools offered for the next turn.
    pub tools: Vec<Arc<dyn AgentTool>>,
    /// Conversation history.
    pub messages: Vec<AgentMessage>,
    /// Whether a run is in flight.
    pub is_streaming: bool,
    /// The message currently streaming, if any.
    pub stream_message: Option<AgentMessage>,
    /// IDs of the last assistant message's tool calls without an appended result.
    pub pending_tool_calls: HashSet<String>,
    /// Error text from the last failed turn.
    pub error: Option<String>,
}

impl AgentState {
    /// Idle state with an empty history.
    pub fn new(model: Model) -> Self {
        Self {
            system_prompt: String::new(),
            model,
            thinking_level: ThinkingLevel::Off,
            tools: Vec::new(),
            messages: Vec::new(),
            is_streaming: false,
            stream_message: None,
            pending_tool_calls: HashSet::new(),
            error: None,
        }
    }
}

impl std::fmt::Debug for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tools: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        f.debug_struct("AgentState")
            .field("model", &self.model.id)
            .field("thinking_level", &self.thinking_level)
            .field("tools", &tools)
            .field("messages", &self.messages.len())
            .field("is_streaming", &self.is_streaming)
            .field("pending_tool_calls", &self.pending_tool_calls)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Options for [`Agent::new`](crate::agent::Agent::new).
pub struct AgentOptions {
    /// Initial model.
    pub model: Model,
    /// Provider lookup for each turn.
    pub registry: Arc<ProviderRegistry>,
    /// Initial system prompt.
    pub system_prompt: String,
    /// Initial reasoning effort.
    pub thinking_level: ThinkingLevel,
    /// Initial tools.
    pub tools: Vec<Arc<dyn AgentTool>>,
    /// Initial history.
    pub messages: Vec<AgentMessage>,
    /// Steering drain mode.
    pub steering_mode: QueueMode,
    /// Follow-up drain mode.
    pub follow_up_mode: QueueMode,
    /// History to LLM message conversion.
    pub convert_to_llm: Arc<dyn ConvertToLlm>,
    /// Optional history rewrite before conversion.
    pub transform_context: Option<Arc<dyn TransformContext>>,
    /// Session identifier forwarded to providers.
    pub session_id: Option<String>,
    /// Token budgets per reasoning level.
    pub thinking_budgets: Option<ThinkingBudgets>,
    /// Upper bound for server-requested retry delays.
    pub max_retry_delay_ms: Option<u64>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Output token limit per turn.
    pub max_tokens: Option<u64>,
    /// Static API key, used when no resolver supplies one.
    pub api_key: Option<String>,
    /// Lazy API key lookup, consulted before every request.
    pub api_key_resolver: Option<Arc<dyn ApiKeyResolver>>,
}

impl AgentOptions {
    /// Defaults for `model`, resolving providers through `registry`.
    pub fn new(model: Model, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            model,
            registry,
            system_prompt: String::new(),
            thinking_level: ThinkingLevel::Off,
            tools: Vec::new(),
            messages: Vec::new(),
            steering_mode: QueueMode::OneAtATime,
            follow_up_mode: QueueMode::OneAtATime,
            convert_to_llm: Arc::new(DefaultConvertToLlm),
            transform_context: None,
            session_id: None,
            thinking_budgets: None,
            max_retry_delay_ms: None,
            temperature: None,
            max_tokens: None,
            api_key: None,
            api_key_resolver: None,
        }
    }

    /// Defaults taken from loaded settings.
    pub fn from_settings(settings: &StrandSettings, model: Model, registry: Arc<ProviderRegistry>) -> Self {
        let agent = &settings.agent;
        Self {
            thinking_level: agent.thinking_level,
            steering_mode: agent.steering_mode,
            follow_up_mode: agent.follow_up_mode,
            session_id: agent.session_id.clone(),
            thinking_budgets: agent.thinking_budgets,
            max_retry_delay_ms: agent.max_retry_delay_ms,
            temperature: agent.temperature,
            max_tokens: agent.max_tokens,
            ..Self::new(model, registry)
        }
    }

    /// Set the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the tools.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<Arc<dyn AgentTool>>) -> Self {
        self.tools = tools;
        self
    }

    /// Set a static API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set a lazy API key resolver.
    #[must_use]
    pub fn with_api_key_resolver(mut self, resolver: Arc<dyn ApiKeyResolver>) -> Self {
        self.api_key_resolver = Some(resolver);
        self
    }

    /// Set the conversion hook.
    #[must_use]
    pub fn with_convert_to_llm(mut self, hook: Arc<dyn ConvertToLlm>) -> Self {
        self.convert_to_llm = hook;
        self
    }

    /// Set the transform hook.
    #[must_use]
    pub fn with_transform_context(mut self, hook: Arc<dyn TransformContext>) -> Self {
        self.transform_context = Some(hook);
        self
    }
}
