//! # strand-runtime
//!
//! Agent orchestration for the strand agent core.
//!
//! - **Agent**: [`Agent`] owns the conversation state and runs the turn loop
//!   (stream a reply, execute its tool calls, repeat) with steering and
//!   follow-up queues, abort, and synchronous event subscription
//! - **Tools**: the [`AgentTool`] trait plus an executor that validates
//!   arguments against the tool's JSON Schema and turns every failure into
//!   an error result
//! - **Hooks**: `convert_to_llm` and `transform_context` seams applied before
//!   each model call

#![deny(unsafe_code)]

pub mod agent;
pub mod errors;
pub mod tools;

pub use agent::Agent;
pub use agent::event_emitter::Subscription;
pub use agent::hooks::{ConvertToLlm, DefaultConvertToLlm, TransformContext};
pub use agent::state::{AgentOptions, AgentState};
pub use errors::{AgentError, ToolError};
pub use tools::{AgentTool, ProgressFn};
