//! # Mock Provider
//!
//! Replays pre-programmed responses in order, for deterministic tests of
//! anything that consumes a [`Provider`]. Streams are built with the
//! [`MessageAccumulator`], so they follow the same event ordering a real
//! adapter produces. Every context the provider receives is recorded for
//! later assertions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use strand_core::content::ToolCall;
use strand_core::events::{AssistantMessageEvent, DoneReason, ErrorReason};
use strand_core::messages::{Context, Usage};
use strand_core::model::{Model, ThinkingLevel};
use tokio_util::sync::CancellationToken;

use crate::accumulator::MessageAccumulator;
use crate::id_remapping::IdSyntax;
use crate::provider::{AssistantEventStream, Provider, ProviderError, ProviderResult, StreamOptions};

/// API identifier served by [`MockProvider::new`].
pub const MOCK_API: &str = "mock";

/// One scripted reply.
#[derive(Debug)]
pub enum MockResponse {
    /// A single text block, then `done(stop)`.
    Text(String),
    /// A thinking block followed by a text block.
    ThinkingText {
        /// Reasoning text.
        thinking: String,
        /// Answer text.
        text: String,
    },
    /// Optional text, then one block per tool call, then `done(toolUse)`.
    ToolCalls {
        /// Text preceding the calls.
        text: Option<String>,
        /// Calls to emit.
        calls: Vec<ToolCall>,
    },
    /// `start`, then `error(error)` with this message.
    StreamError(String),
    /// Fail before any stream is produced.
    SetupError(ProviderError),
    /// Emit these events verbatim.
    Raw(Vec<AssistantMessageEvent>),
    /// Wait (cancellably), then handle the inner response.
    Delay(Duration, Box<MockResponse>),
    /// Stream some text, then wait until the request is cancelled and end
    /// with `error(aborted)`.
    HangUntilCancelled(String),
}

impl MockResponse {
    /// Plain text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A single tool call with object arguments.
    pub fn tool_call(id: &str, name: &str, arguments: Value) -> Self {
        Self::tool_calls(vec![(id, name, arguments)])
    }

    /// Several tool calls in one message.
    pub fn tool_calls(calls: Vec<(&str, &str, Value)>) -> Self {
        let calls = calls
            .into_iter()
            .map(|(id, name, args)| {
                let arguments = match args {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                ToolCall::new(id, name, arguments)
            })
            .collect();
        Self::ToolCalls { text: None, calls }
    }

    /// Wrap any response with a delay.
    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Provider returning scripted responses in sequence.
#[derive(Debug)]
pub struct MockProvider {
    provider: Option<String>,
    api: String,
    id_syntax: Option<IdSyntax>,
    responses: Mutex<VecDeque<MockResponse>>,
    contexts: Mutex<Vec<Context>>,
    reasoning: Mutex<Vec<Option<ThinkingLevel>>>,
    api_keys: Mutex<Vec<Option<String>>>,
    call_count: AtomicUsize,
}

impl MockProvider {
    /// Wildcard provider speaking [`MOCK_API`].
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self::with_endpoint(None, MOCK_API, responses)
    }

    /// Provider registered under an explicit endpoint.
    pub fn with_endpoint(provider: Option<&str>, api: &str, responses: Vec<MockResponse>) -> Self {
        Self {
            provider: provider.map(str::to_owned),
            api: api.to_owned(),
            id_syntax: None,
            responses: Mutex::new(responses.into()),
            contexts: Mutex::new(Vec::new()),
            reasoning: Mutex::new(Vec::new()),
            api_keys: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Declare a tool call ID syntax the endpoint enforces.
    #[must_use]
    pub fn with_id_syntax(mut self, syntax: IdSyntax) -> Self {
        self.id_syntax = Some(syntax);
        self
    }

    /// Queue another response.
    pub fn push(&self, response: MockResponse) {
        self.responses.lock().push_back(response);
    }

    /// Number of `stream` calls so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Contexts received, in call order.
    pub fn contexts(&self) -> Vec<Context> {
        self.contexts.lock().clone()
    }

    /// Reasoning level requested on each call.
    pub fn reasoning_levels(&self) -> Vec<Option<ThinkingLevel>> {
        self.reasoning.lock().clone()
    }

    /// API key received on each call.
    pub fn api_keys(&self) -> Vec<Option<String>> {
        self.api_keys.lock().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    fn api(&self) -> &str {
        &self.api
    }

    fn tool_call_id_syntax(&self, _model: &Model) -> Option<IdSyntax> {
        self.id_syntax
    }

    async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> ProviderResult<AssistantEventStream> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.contexts.lock().push(context.clone());
        self.reasoning.lock().push(options.reasoning);
        self.api_keys.lock().push(options.api_key.clone());

        let Some(mut response) = self.responses.lock().pop_front() else {
            return Err(ProviderError::Other {
                message: format!("MockProvider: no response configured for call {idx}"),
            });
        };

        // Unroll nested delays iteratively.
        loop {
            match response {
                MockResponse::Delay(duration, inner) => {
                    tokio::select! {
                        biased;
                        () = options.cancel.cancelled() => return Err(ProviderError::Cancelled),
                        () = tokio::time::sleep(duration) => {}
                    }
                    response = *inner;
                }
                MockResponse::SetupError(e) => return Err(e),
                other => return Ok(script(model, other, options.cancel.clone())),
            }
        }
    }
}

fn usage() -> Usage {
    Usage {
        input: 10,
        output: 5,
        total_tokens: 15,
        ..Usage::default()
    }
}

/// Split serialized arguments in two so consumers see a partial parse.
fn split_args(arguments: &Map<String, Value>) -> (String, String) {
    let raw = Value::Object(arguments.clone()).to_string();
    let mut mid = raw.len() / 2;
    while !raw.is_char_boundary(mid) {
        mid -= 1;
    }
    let tail = raw[mid..].to_string();
    let mut head = raw;
    head.truncate(mid);
    (head, tail)
}

fn script(model: &Model, response: MockResponse, cancel: CancellationToken) -> AssistantEventStream {
    let model = model.clone();
    Box::pin(async_stream::stream! {
        let mut acc = MessageAccumulator::new(&model);
        acc.set_usage(usage());
        match response {
            MockResponse::Raw(events) => {
                for event in events {
                    yield event;
                }
            }
            MockResponse::Text(text) => {
                yield acc.start();
                let (idx, start) = acc.text_start();
                yield start;
                if let Some(e) = acc.text_delta(idx, &text) { yield e; }
                if let Some(e) = acc.text_end(idx, None) { yield e; }
                yield acc.done(DoneReason::Stop);
            }
            MockResponse::ThinkingText { thinking, text } => {
                yield acc.start();
                let (t, start) = acc.thinking_start();
                yield start;
                if let Some(e) = acc.thinking_delta(t, &thinking) { yield e; }
                if let Some(e) = acc.thinking_end(t, Some(format!("sig-{}", model.id))) { yield e; }
                let (idx, start) = acc.text_start();
                yield start;
                if let Some(e) = acc.text_delta(idx, &text) { yield e; }
                if let Some(e) = acc.text_end(idx, None) { yield e; }
                yield acc.done(DoneReason::Stop);
            }
            MockResponse::ToolCalls { text, calls } => {
                yield acc.start();
                if let Some(text) = text {
                    let (idx, start) = acc.text_start();
                    yield start;
                    if let Some(e) = acc.text_delta(idx, &text) { yield e; }
                    if let Some(e) = acc.text_end(idx, None) { yield e; }
                }
                for call in calls {
                    let (idx, start) = acc.tool_call_start(call.id.clone(), call.name.clone());
                    yield start;
                    let (head, tail) = split_args(&call.arguments);
                    if let Some(e) = acc.tool_call_delta(idx, &head) { yield e; }
                    if let Some(e) = acc.tool_call_delta(idx, &tail) { yield e; }
                    if let Some(e) = acc.tool_call_end(idx) { yield e; }
                }
                yield acc.done(DoneReason::ToolUse);
            }
            MockResponse::StreamError(message) => {
                yield acc.start();
                yield acc.error(ErrorReason::Error, message);
            }
            MockResponse::HangUntilCancelled(text) => {
                yield acc.start();
                let (idx, start) = acc.text_start();
                yield start;
                if let Some(e) = acc.text_delta(idx, &text) { yield e; }
                cancel.cancelled().await;
                yield acc.error(ErrorReason::Aborted, "Request was aborted");
            }
            MockResponse::Delay(..) | MockResponse::SetupError(_) => {
                yield acc.error(ErrorReason::Error, "unresolved mock response");
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
