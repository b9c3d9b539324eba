//! # strand-llm
//!
//! LLM-facing layer of the strand agent core.
//!
//! - **Provider**: the [`Provider`](provider::Provider) trait every backend
//!   adapter implements, plus a registry keyed by `(provider, api)`
//! - **Streaming**: an event channel for adapters, a message accumulator
//!   that emits correctly ordered events, and progressive JSON parsing for
//!   tool call arguments
//! - **Normalization**: rewriting a history produced by one model so it can
//!   be replayed against another, including tool call ID remapping and
//!   orphaned call repair
//! - **Overflow**: context window overflow detection
//! - **Mock**: a scripted provider for tests

#![deny(unsafe_code)]

pub mod accumulator;
pub mod event_stream;
pub mod id_remapping;
pub mod mock;
pub mod normalize;
pub mod overflow;
pub mod partial_json;
pub mod provider;
pub mod registry;
pub mod tool_parsing;

pub use accumulator::MessageAccumulator;
pub use event_stream::{EventSender, collect_message, event_channel};
pub use id_remapping::{IdRemapTable, IdSyntax};
pub use normalize::{IdRemapFn, normalize};
pub use overflow::is_context_overflow;
pub use provider::{
    ApiKeyResolver, AssistantEventStream, Provider, ProviderError, ProviderResult, StreamOptions,
};
pub use registry::{ProviderRegistry, stream_with_registry};
