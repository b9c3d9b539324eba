//! Runtime error types.

/// Precondition failures for agent entry points.
///
/// Returned synchronously; the agent state is untouched when one is returned.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AgentError {
    /// A run is already in flight.
    #[error(
        "Agent is already processing a prompt. Use steer() or follow_up() to queue messages, or wait for completion."
    )]
    AlreadyStreaming,

    /// `continue_` was called on an empty history.
    #[error("No messages to continue from")]
    NoMessages,

    /// `continue_` was called when the last message cannot be answered.
    #[error("Cannot continue from message role: {role}")]
    CannotContinueFrom {
        /// Role of the last message.
        role: String,
    },
}

impl AgentError {
    /// Error category string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::AlreadyStreaming => "busy",
            Self::NoMessages | Self::CannotContinueFrom { .. } => "precondition",
        }
    }
}

/// Failures of a single tool call.
///
/// Always converted into an `isError` tool result; the message text is what
/// the model sees.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ToolError {
    /// No tool with the requested name is available this turn.
    #[error("Tool {name} not found")]
    NotFound {
        /// Requested tool name.
        name: String,
    },

    /// Arguments do not satisfy the tool's parameter schema.
    #[error("{message}")]
    Validation {
        /// Tool name.
        tool_name: String,
        /// Formatted violation list, including the received arguments.
        message: String,
    },

    /// The tool returned an error or panicked.
    #[error("{message}")]
    Execution {
        /// Error description.
        message: String,
    },

    /// The run was aborted before or during execution.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ToolError {
    /// Error category string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation",
            Self::Execution { .. } => "execution",
            Self::Cancelled => "cancelled",
        }
    }
}
