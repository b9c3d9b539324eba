//! # strand-core
//!
//! Foundation types for the strand agent core.
//!
//! This crate provides the shared vocabulary that the LLM and runtime crates depend on:
//!
//! - **Content blocks**: text, thinking, image, and tool-call blocks
//! - **Messages**: the LLM-level `Message` union and the open `AgentMessage` union
//! - **Models**: endpoint identity (`provider`, `api`, `id`) and thinking levels
//! - **Tools**: tool declarations and execution outcomes
//! - **Events**: the per-turn streaming contract and agent lifecycle events
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod content;
pub mod events;
pub mod logging;
pub mod messages;
pub mod model;
pub mod tools;

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
