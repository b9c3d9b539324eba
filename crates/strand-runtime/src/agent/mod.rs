//! Agent execution modules.

pub mod event_emitter;
pub mod hooks;
pub mod queue;
pub mod state;
pub mod stream_processor;
pub mod strand_agent;
pub mod turn_runner;

pub use strand_agent::Agent;
