//! `Agent`: stateful wrapper around the turn loop, with steering and
//! follow-up queues, abort, and event subscription.
//!
//! All methods take `&self`, so an `Arc<Agent>` can be shared between the
//! task running a prompt and the callers that steer, abort or observe it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use strand_core::content::{ImageContent, UserContent};
use strand_core::events::AgentEvent;
use strand_core::messages::{AgentMessage, UserMessage};
use strand_core::model::{Model, ThinkingBudgets, ThinkingLevel};
use strand_core::now_ms;
use strand_llm::{ApiKeyResolver, ProviderRegistry, StreamOptions};
use strand_settings::QueueMode;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::agent::event_emitter::{EventEmitter, Subscription};
use crate::agent::hooks::{ConvertToLlm, TransformContext};
use crate::agent::queue::MessageQueue;
use crate::agent::state::{AgentOptions, AgentState};
use crate::agent::turn_runner;
use crate::errors::AgentError;
use crate::tools::AgentTool;

/// RAII guard that resets `running` to `false` on drop (even on panic).
pub(crate) struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Per-request settings that do not change between turns.
pub(crate) struct RequestConfig {
    session_id: Option<String>,
    thinking_budgets: Option<ThinkingBudgets>,
    max_retry_delay_ms: Option<u64>,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
    api_key: Option<String>,
    api_key_resolver: Option<Arc<dyn ApiKeyResolver>>,
}

impl RequestConfig {
    pub(crate) fn stream_options(&self, thinking_level: ThinkingLevel, cancel: CancellationToken) -> StreamOptions {
        StreamOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            api_key: self.api_key.clone(),
            api_key_resolver: self.api_key_resolver.clone(),
            session_id: self.session_id.clone(),
            reasoning: thinking_level.as_reasoning(),
            thinking_budgets: self.thinking_budgets,
            max_retry_delay_ms: self.max_retry_delay_ms,
            cancel,
            ..StreamOptions::default()
        }
    }
}

/// Multi-turn agent.
pub struct Agent {
    pub(crate) state: RwLock<AgentState>,
    pub(crate) registry: Arc<ProviderRegistry>,
    pub(crate) convert_to_llm: Arc<dyn ConvertToLlm>,
    pub(crate) transform_context: Option<Arc<dyn TransformContext>>,
    pub(crate) steering: MessageQueue,
    pub(crate) follow_up: MessageQueue,
    pub(crate) request: RequestConfig,
    emitter: EventEmitter,
    running: AtomicBool,
    busy: watch::Sender<bool>,
    abort: Mutex<CancellationToken>,
}

impl Agent {
    /// Create an idle agent.
    pub fn new(options: AgentOptions) -> Self {
        let AgentOptions {
            model,
            registry,
            system_prompt,
            thinking_level,
            tools,
            messages,
            steering_mode,
            follow_up_mode,
            convert_to_llm,
            transform_context,
            session_id,
            thinking_budgets,
            max_retry_delay_ms,
            temperature,
            max_tokens,
            api_key,
            api_key_resolver,
        } = options;

        let state = AgentState {
            system_prompt,
            thinking_level,
            tools,
            messages,
            ..AgentState::new(model)
        };
        let (busy, _) = watch::channel(false);

        Self {
            state: RwLock::new(state),
            registry,
            convert_to_llm,
            transform_context,
            steering: MessageQueue::new(steering_mode),
            follow_up: MessageQueue::new(follow_up_mode),
            request: RequestConfig {
                session_id,
                thinking_budgets,
                max_retry_delay_ms,
                temperature,
                max_tokens,
                api_key,
                api_key_resolver,
            },
            emitter: EventEmitter::new(),
            running: AtomicBool::new(false),
            busy,
            abort: Mutex::new(CancellationToken::new()),
        }
    }

    // ── Observation ─────────────────────────────────────────────────────

    /// Register a listener for every event emitted after this call.
    ///
    /// Listeners run synchronously on the task driving the run and see the
    /// state already updated for the event.
    pub fn subscribe(&self, listener: impl Fn(&AgentEvent) + Send + Sync + 'static) -> Subscription {
        self.emitter.subscribe(listener)
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AgentState {
        self.state.read().clone()
    }

    /// Whether a run is in flight.
    pub fn is_streaming(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ── Configuration ───────────────────────────────────────────────────

    /// Replace the system prompt. Takes effect on the next turn.
    pub fn set_system_prompt(&self, prompt: impl Into<String>) {
        self.state.write().system_prompt = prompt.into();
    }

    /// Switch models. Takes effect on the next turn.
    pub fn set_model(&self, model: Model) {
        self.state.write().model = model;
    }

    /// Current model.
    pub fn model(&self) -> Model {
        self.state.read().model.clone()
    }

    /// Change reasoning effort. Takes effect on the next turn.
    pub fn set_thinking_level(&self, level: ThinkingLevel) {
        self.state.write().thinking_level = level;
    }

    /// Current reasoning effort.
    pub fn thinking_level(&self) -> ThinkingLevel {
        self.state.read().thinking_level
    }

    /// Replace the toolset. Takes effect on the next turn.
    pub fn set_tools(&self, tools: Vec<Arc<dyn AgentTool>>) {
        self.state.write().tools = tools;
    }

    /// Steering queue drain mode.
    pub fn set_steering_mode(&self, mode: QueueMode) {
        self.steering.set_mode(mode);
    }

    /// Current steering drain mode.
    pub fn steering_mode(&self) -> QueueMode {
        self.steering.mode()
    }

    /// Follow-up queue drain mode.
    pub fn set_follow_up_mode(&self, mode: QueueMode) {
        self.follow_up.set_mode(mode);
    }

    /// Current follow-up drain mode.
    pub fn follow_up_mode(&self) -> QueueMode {
        self.follow_up.mode()
    }

    // ── History ─────────────────────────────────────────────────────────

    /// Replace the whole history.
    pub fn replace_messages(&self, messages: Vec<AgentMessage>) {
        self.state.write().messages = messages;
    }

    /// Append one message without running a turn.
    pub fn append_message(&self, message: AgentMessage) {
        self.state.write().messages.push(message);
    }

    /// Empty the history.
    pub fn clear_messages(&self) {
        self.state.write().messages.clear();
    }

    // ── Queues ──────────────────────────────────────────────────────────

    /// Queue a message that interrupts the current tool batch.
    pub fn steer(&self, message: AgentMessage) {
        self.steering.push(message);
    }

    /// Queue a message to run once the agent would otherwise stop.
    pub fn follow_up(&self, message: AgentMessage) {
        self.follow_up.push(message);
    }

    /// Drop queued steering messages.
    pub fn clear_steering_queue(&self) {
        self.steering.clear();
    }

    /// Drop queued follow-up messages.
    pub fn clear_follow_up_queue(&self) {
        self.follow_up.clear();
    }

    /// Drop both queues.
    pub fn clear_all_queues(&self) {
        self.steering.clear();
        self.follow_up.clear();
    }

    // ── Control ─────────────────────────────────────────────────────────

    /// Cancel the current run, if any.
    pub fn abort(&self) {
        self.abort.lock().cancel();
    }

    /// Resolve once no run is in flight.
    pub async fn wait_for_idle(&self) {
        let mut rx = self.busy.subscribe();
        let _ = rx.wait_for(|busy| !*busy).await;
    }

    /// Clear history, error, and both queues.
    pub fn reset(&self) {
        {
            let mut state = self.state.write();
            state.messages.clear();
            state.stream_message = None;
            state.pending_tool_calls.clear();
            state.error = None;
        }
        self.clear_all_queues();
    }

    // ── Entry points ────────────────────────────────────────────────────

    /// Send a text prompt, optionally with images.
    pub async fn prompt_text(&self, text: impl Into<String>, images: Vec<ImageContent>) -> Result<(), AgentError> {
        let mut content = vec![UserContent::text(text)];
        content.extend(images.into_iter().map(UserContent::Image));
        let message = UserMessage {
            content,
            timestamp: now_ms(),
        };
        self.prompt(vec![message.into()]).await
    }

    /// Append `messages` and run until the agent stops.
    ///
    /// An empty batch behaves like [`continue_`](Self::continue_).
    /// Provider and tool failures are recorded in the history, not returned.
    #[instrument(skip_all, fields(model = %self.model().id, prompts = messages.len()))]
    pub async fn prompt(&self, messages: Vec<AgentMessage>) -> Result<(), AgentError> {
        if messages.is_empty() {
            return self.continue_().await;
        }
        let Some(guard) = RunGuard::new(&self.running) else {
            return Err(AgentError::AlreadyStreaming);
        };
        self.run(guard, messages).await;
        Ok(())
    }

    /// Run from the current history without adding a message.
    ///
    /// The last message must be a `user` or `toolResult` message.
    #[instrument(skip_all, fields(model = %self.model().id))]
    pub async fn continue_(&self) -> Result<(), AgentError> {
        let Some(guard) = RunGuard::new(&self.running) else {
            return Err(AgentError::AlreadyStreaming);
        };
        let last_role = self.state.read().messages.last().map(AgentMessage::role);
        match last_role {
            None => return Err(AgentError::NoMessages),
            Some("user" | "toolResult") => {}
            Some(role) => {
                return Err(AgentError::CannotContinueFrom { role: role.to_owned() });
            }
        }
        self.run(guard, Vec::new()).await;
        Ok(())
    }

    async fn run(&self, guard: RunGuard<'_>, prompts: Vec<AgentMessage>) {
        let cancel = CancellationToken::new();
        *self.abort.lock() = cancel.clone();
        let _ = self.busy.send_replace(true);
        {
            let mut state = self.state.write();
            state.is_streaming = true;
            state.stream_message = None;
            state.error = None;
        }
        info!("agent run started");

        turn_runner::run_loop(self, prompts, &cancel).await;

        {
            let mut state = self.state.write();
            state.is_streaming = false;
            state.stream_message = None;
            state.pending_tool_calls.clear();
        }
        drop(guard);
        let _ = self.busy.send_replace(false);
        info!("agent run finished");
    }

    /// Apply `event` to the state, then deliver it to listeners.
    pub(crate) fn dispatch(&self, event: AgentEvent) {
        {
            let mut state = self.state.write();
            match &event {
                AgentEvent::MessageStart { message } | AgentEvent::MessageUpdate { message, .. } => {
                    state.stream_message = Some(message.clone());
                }
                AgentEvent::MessageEnd { message } => {
                    state.stream_message = None;
                    match message {
                        AgentMessage::Assistant(m) => {
                            state.pending_tool_calls = m.tool_calls().map(|c| c.id.clone()).collect();
                        }
                        AgentMessage::ToolResult(r) => {
                            let _ = state.pending_tool_calls.remove(&r.tool_call_id);
                        }
                        _ => {}
                    }
                    state.messages.push(message.clone());
                }
                AgentEvent::TurnEnd { message, .. } => {
                    if let Some(err) = message.as_assistant().and_then(|m| m.error_message.as_ref()) {
                        state.error = Some(err.clone());
                    }
                }
                AgentEvent::AgentEnd { .. } => {
                    state.is_streaming = false;
                    state.stream_message = None;
                }
                AgentEvent::AgentStart
                | AgentEvent::TurnStart
                | AgentEvent::ToolExecutionStart { .. }
                | AgentEvent::ToolExecutionUpdate { .. }
                | AgentEvent::ToolExecutionEnd { .. } => {}
            }
        }
        let _ = self.emitter.emit(&event);
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("state", &*self.state.read())
            .field("steering", &self.steering.len())
            .field("follow_up", &self.follow_up.len())
            .field("running", &self.is_streaming())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::AtomicUsize;
    use strand_core::content::{AssistantContent, ToolCall};
    use strand_core::messages::{AssistantMessage, StopReason, ToolResultMessage};

    fn agent() -> Agent {
        Agent::new(AgentOptions::new(
            Model::new("mock", "mock", "mock-model"),
            Arc::new(ProviderRegistry::new()),
        ))
    }

    fn assistant() -> AgentMessage {
        AgentMessage::Assistant(AssistantMessage::empty_for(&Model::new("mock", "mock", "mock-model")))
    }

    // ── RunGuard ──

    #[test]
    fn run_guard_is_exclusive_and_resets() {
        let flag = AtomicBool::new(false);
        let guard = RunGuard::new(&flag);
        assert!(guard.is_some());
        assert!(RunGuard::new(&flag).is_none());
        drop(guard);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(RunGuard::new(&flag).is_some());
    }

    // ── Reducer ──

    #[test]
    fn message_end_appends_and_clears_stream_message() {
        let a = agent();
        let msg = AgentMessage::user_text("hi");
        a.dispatch(AgentEvent::MessageStart { message: msg.clone() });
        assert!(a.state().stream_message.is_some());
        a.dispatch(AgentEvent::MessageEnd { message: msg.clone() });
        let state = a.state();
        assert!(state.stream_message.is_none());
        assert_eq!(state.messages, vec![msg]);
    }

    #[test]
    fn pending_ids_follow_appended_results() {
        let a = agent();
        let model = a.model();
        let mut msg = AssistantMessage::empty_for(&model);
        let first = ToolCall::new("t1", "read", serde_json::Map::new());
        let second = ToolCall::new("t2", "read", serde_json::Map::new());
        msg.content = vec![
            AssistantContent::ToolCall(first.clone()),
            AssistantContent::ToolCall(second.clone()),
        ];
        a.dispatch(AgentEvent::MessageEnd { message: msg.into() });
        assert_eq!(a.state().pending_tool_calls.len(), 2);

        a.dispatch(AgentEvent::MessageEnd {
            message: AgentMessage::ToolResult(ToolResultMessage::error(&first, "x")),
        });
        assert!(a.state().pending_tool_calls.contains("t2"));
        a.dispatch(AgentEvent::MessageEnd {
            message: AgentMessage::ToolResult(ToolResultMessage::error(&second, "x")),
        });
        assert!(a.state().pending_tool_calls.is_empty());
    }

    #[test]
    fn turn_end_with_error_sets_state_error() {
        let a = agent();
        let failed = AssistantMessage::failure(&a.model(), StopReason::Error, "boom");
        a.dispatch(AgentEvent::TurnEnd {
            message: failed.into(),
            tool_results: Vec::new(),
        });
        assert_eq!(a.state().error.as_deref(), Some("boom"));
    }

    #[test]
    fn listeners_see_reduced_state() {
        let a = Arc::new(agent());
        let seen = Arc::new(AtomicUsize::new(0));
        let (weak, s) = (Arc::downgrade(&a), Arc::clone(&seen));
        let _ = a.subscribe(move |e| {
            if let (AgentEvent::MessageEnd { .. }, Some(agent)) = (e, weak.upgrade()) {
                s.store(agent.state().messages.len(), Ordering::SeqCst);
            }
        });
        a.dispatch(AgentEvent::MessageEnd {
            message: AgentMessage::user_text("x"),
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    // ── Preconditions ──

    #[tokio::test]
    async fn continue_on_empty_history() {
        assert_eq!(agent().continue_().await, Err(AgentError::NoMessages));
    }

    #[tokio::test]
    async fn continue_after_assistant_is_rejected_without_mutation() {
        let a = agent();
        a.append_message(AgentMessage::user_text("hi"));
        a.append_message(assistant());
        let before = a.state().messages;
        let result = a.continue_().await;
        assert_matches!(result, Err(AgentError::CannotContinueFrom { role }) if role == "assistant");
        assert_eq!(a.state().messages, before);
        assert!(!a.is_streaming());
    }

    #[tokio::test]
    async fn empty_prompt_is_a_continue() {
        let a = agent();
        a.append_message(assistant());
        assert_matches!(a.prompt(Vec::new()).await, Err(AgentError::CannotContinueFrom { .. }));
    }

    // ── History & queues ──

    #[test]
    fn reset_clears_history_and_queues() {
        let a = agent();
        let call = ToolCall::new("t1", "read", serde_json::Map::new());
        a.append_message(AgentMessage::ToolResult(ToolResultMessage::error(&call, "x")));
        a.steer(AgentMessage::user_text("s"));
        a.follow_up(AgentMessage::user_text("f"));
        a.reset();
        assert!(a.state().messages.is_empty());
        assert!(a.steering.is_empty());
        assert!(a.follow_up.is_empty());
    }

    #[test]
    fn setters_update_state() {
        let a = agent();
        a.set_system_prompt("be brief");
        a.set_thinking_level(ThinkingLevel::High);
        a.set_steering_mode(QueueMode::All);
        a.set_model(Model::new("other", "mock", "m2"));
        let state = a.state();
        assert_eq!(state.system_prompt, "be brief");
        assert_eq!(state.thinking_level, ThinkingLevel::High);
        assert_eq!(state.model.id, "m2");
        assert_eq!(a.steering_mode(), QueueMode::All);
        assert_eq!(a.follow_up_mode(), QueueMode::OneAtATime);
    }

    #[tokio::test]
    async fn wait_for_idle_returns_when_not_running() {
        let a = agent();
        tokio::time::timeout(std::time::Duration::from_secs(1), a.wait_for_idle())
            .await
            .unwrap();
    }
}
