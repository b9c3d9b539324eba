//! Tool trait and execution.
//!
//! [`AgentTool`] is what every tool implements. The runtime never interprets
//! a tool's behavior; it validates arguments against
//! [`parameters`](AgentTool::parameters), runs
//! [`execute`](AgentTool::execute) under a cancellation token, and turns the
//! outcome into a tool result message.

pub mod executor;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use strand_core::tools::{Tool, ToolOutcome};
use tokio_util::sync::CancellationToken;

/// Callback a tool uses to report partial output while it runs.
pub type ProgressFn<'a> = dyn Fn(ToolOutcome) + Send + Sync + 'a;

/// The core trait every tool implements.
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// Tool name, the exact string sent to and from the model.
    fn name(&self) -> &str;

    /// Human-readable label for display.
    fn label(&self) -> &str {
        self.name()
    }

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the arguments object.
    fn parameters(&self) -> Value;

    /// Declaration sent to the model.
    fn definition(&self) -> Tool {
        Tool {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters: self.parameters(),
        }
    }

    /// Run the tool with validated arguments.
    ///
    /// `cancel` fires when the run is aborted. Errors become `isError`
    /// tool results carrying the error chain as text.
    async fn execute(
        &self,
        call_id: &str,
        args: Map<String, Value>,
        cancel: CancellationToken,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> anyhow::Result<ToolOutcome>;
}

/// Find a tool by name.
pub fn find_tool<'a>(tools: &'a [Arc<dyn AgentTool>], name: &str) -> Option<&'a Arc<dyn AgentTool>> {
    tools.iter().find(|t| t.name() == name)
}

/// Declarations for every tool, in order.
pub fn definitions(tools: &[Arc<dyn AgentTool>]) -> Vec<Tool> {
    tools.iter().map(|t| t.definition()).collect()
}
