//! Tool executor: validate → execute → catch.
//!
//! Every failure mode (unknown tool, schema violation, returned error, panic,
//! cancellation) comes back as a [`ToolError`], which the turn runner turns
//! into an `isError` tool result. Nothing a tool does can end the run.

use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use strand_core::content::ToolCall;
use strand_core::messages::ToolResultMessage;
use strand_core::now_ms;
use strand_core::tools::ToolOutcome;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::errors::ToolError;
use crate::tools::schema;
use crate::tools::{AgentTool, ProgressFn, find_tool};

/// Execute `call` with `tool`.
#[instrument(skip_all, fields(tool_name = %call.name, tool_call_id = %call.id))]
pub async fn execute(
    tool: &dyn AgentTool,
    call: &ToolCall,
    cancel: &CancellationToken,
    on_progress: Option<&ProgressFn<'_>>,
) -> Result<ToolOutcome, ToolError> {
    if cancel.is_cancelled() {
        return Err(ToolError::Cancelled);
    }

    let args = Value::Object(call.arguments.clone());
    if let Err(violations) = schema::validate(&tool.parameters(), &args) {
        warn!(violations = violations.len(), "tool arguments failed validation");
        return Err(ToolError::Validation {
            tool_name: call.name.clone(),
            message: schema::format_violations(&call.name, &violations, &call.arguments),
        });
    }

    debug!("tool execution started");
    let run = std::panic::AssertUnwindSafe(tool.execute(
        &call.id,
        call.arguments.clone(),
        cancel.clone(),
        on_progress,
    ))
    .catch_unwind();

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(ToolError::Cancelled),
        outcome = run => outcome,
    };

    match outcome {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => {
            let message = format!("{e:#}");
            warn!(error = %message, "tool returned error");
            Err(ToolError::Execution { message })
        }
        Err(panic) => {
            let message = panic_message(&panic);
            error!(panic = %message, "tool panicked");
            Err(ToolError::Execution {
                message: format!("Tool panicked: {message}"),
            })
        }
    }
}

/// Look up the tool for `call` in `tools` and execute it.
pub async fn execute_tool_call(
    tools: &[Arc<dyn AgentTool>],
    call: &ToolCall,
    cancel: &CancellationToken,
    on_progress: Option<&ProgressFn<'_>>,
) -> Result<ToolOutcome, ToolError> {
    let Some(tool) = find_tool(tools, &call.name) else {
        warn!(tool_name = %call.name, "tool not found");
        return Err(ToolError::NotFound {
            name: call.name.clone(),
        });
    };
    execute(tool.as_ref(), call, cancel, on_progress).await
}

/// Build the tool result message and the outcome reported on
/// `tool_execution_end` for a finished call.
pub fn into_result(call: &ToolCall, result: Result<ToolOutcome, ToolError>) -> (ToolResultMessage, ToolOutcome, bool) {
    match result {
        Ok(outcome) => {
            let message = ToolResultMessage {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                content: outcome.content.clone(),
                details: outcome.details.clone(),
                is_error: false,
                timestamp: now_ms(),
            };
            (message, outcome, false)
        }
        Err(e) => {
            let text = e.to_string();
            (ToolResultMessage::error(call, text.clone()), ToolOutcome::text(text), true)
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Map, json};
    use std::time::Duration;

    // ── Test tool implementations ──

    struct EchoTool;

    #[async_trait]
    impl AgentTool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes input"
        }
        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            _call_id: &str,
            args: Map<String, Value>,
            _cancel: CancellationToken,
            on_progress: Option<&ProgressFn<'_>>,
        ) -> anyhow::Result<ToolOutcome> {
            let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
            if let Some(progress) = on_progress {
                progress(ToolOutcome::text("working"));
            }
            Ok(ToolOutcome::text(text).with_details(json!({"len": text.len()})))
        }
    }

    struct FailTool;

    #[async_trait]
    impl AgentTool for FailTool {
        fn name(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(
            &self,
            _call_id: &str,
            _args: Map<String, Value>,
            _cancel: CancellationToken,
            _on_progress: Option<&ProgressFn<'_>>,
        ) -> anyhow::Result<ToolOutcome> {
            Err(anyhow::anyhow!("disk full").context("write failed"))
        }
    }

    struct PanicTool;

    #[async_trait]
    impl AgentTool for PanicTool {
        fn name(&self) -> &str {
            "panic"
        }
        fn description(&self) -> &str {
            "Panics"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(
            &self,
            _call_id: &str,
            _args: Map<String, Value>,
            _cancel: CancellationToken,
            _on_progress: Option<&ProgressFn<'_>>,
        ) -> anyhow::Result<ToolOutcome> {
            panic!("index out of bounds");
        }
    }

    struct SleepTool;

    #[async_trait]
    impl AgentTool for SleepTool {
        fn name(&self) -> &str {
            "sleep"
        }
        fn description(&self) -> &str {
            "Sleeps for a minute"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(
            &self,
            _call_id: &str,
            _args: Map<String, Value>,
            _cancel: CancellationToken,
            _on_progress: Option<&ProgressFn<'_>>,
        ) -> anyhow::Result<ToolOutcome> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ToolOutcome::text("woke"))
        }
    }

    fn call(name: &str, args: Value) -> ToolCall {
        let Value::Object(map) = args else {
            panic!("args must be an object");
        };
        ToolCall::new("tc-1", name, map)
    }

    fn toolset() -> Vec<Arc<dyn AgentTool>> {
        vec![Arc::new(EchoTool), Arc::new(FailTool), Arc::new(PanicTool)]
    }

    // ── Success ──

    #[tokio::test]
    async fn executes_valid_call() {
        let cancel = CancellationToken::new();
        let outcome = execute(&EchoTool, &call("echo", json!({"text": "hi"})), &cancel, None)
            .await
            .unwrap();
        assert_eq!(outcome.content[0].as_text(), Some("hi"));
        assert_eq!(outcome.details["len"], 2);
    }

    #[tokio::test]
    async fn progress_is_forwarded() {
        let seen = Mutex::new(Vec::new());
        let on_progress = |o: ToolOutcome| seen.lock().push(o);
        let cancel = CancellationToken::new();
        let _ = execute(&EchoTool, &call("echo", json!({"text": "x"})), &cancel, Some(&on_progress))
            .await
            .unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn progress_callback_may_borrow_the_call() {
        let tools = toolset();
        let calls = vec![call("echo", json!({"text": "a"})), call("echo", json!({"text": "b"}))];
        let seen: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let cancel = CancellationToken::new();
        for c in &calls {
            let on_progress = |_: ToolOutcome| seen.lock().push(c.id.clone());
            let _ = execute_tool_call(&tools, c, &cancel, Some(&on_progress)).await.unwrap();
        }
        assert_eq!(seen.lock().len(), 2);
    }

    // ── Failures ──

    #[tokio::test]
    async fn validation_failure_skips_execution() {
        let cancel = CancellationToken::new();
        let err = execute(&EchoTool, &call("echo", json!({"text": 5})), &cancel, None)
            .await
            .unwrap_err();
        assert_matches!(&err, ToolError::Validation { tool_name, .. } if tool_name == "echo");
        let text = err.to_string();
        assert!(text.starts_with("Validation failed for tool \"echo\":"));
        assert!(text.contains("text: 5 is not of type 'string'"));
    }

    #[tokio::test]
    async fn tool_error_chain_is_flattened() {
        let cancel = CancellationToken::new();
        let err = execute(&FailTool, &call("fail", json!({})), &cancel, None).await.unwrap_err();
        assert_eq!(err, ToolError::Execution {
            message: "write failed: disk full".into()
        });
    }

    #[tokio::test]
    async fn panic_is_caught() {
        let cancel = CancellationToken::new();
        let err = execute(&PanicTool, &call("panic", json!({})), &cancel, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Tool panicked: index out of bounds");
    }

    #[tokio::test]
    async fn already_cancelled_never_runs() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = execute(&PanicTool, &call("panic", json!({})), &cancel, None).await.unwrap_err();
        assert_eq!(err, ToolError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_running_tool() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let _ = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let err = execute(&SleepTool, &call("sleep", json!({})), &cancel, None).await.unwrap_err();
        assert_eq!(err, ToolError::Cancelled);
    }

    // ── Lookup & result mapping ──

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let cancel = CancellationToken::new();
        let err = execute_tool_call(&toolset(), &call("bash", json!({})), &cancel, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Tool bash not found");
    }

    #[test]
    fn error_result_message_carries_text() {
        let c = call("fail", json!({}));
        let (msg, outcome, is_error) = into_result(&c, Err(ToolError::Cancelled));
        assert!(is_error);
        assert!(msg.is_error);
        assert_eq!(msg.tool_call_id, "tc-1");
        assert_eq!(msg.content[0].as_text(), Some("Operation cancelled"));
        assert_eq!(outcome.content[0].as_text(), Some("Operation cancelled"));
    }

    #[test]
    fn success_result_message_keeps_details() {
        let c = call("echo", json!({}));
        let (msg, _, is_error) = into_result(&c, Ok(ToolOutcome::text("ok").with_details(json!({"a": 1}))));
        assert!(!is_error);
        assert!(!msg.is_error);
        assert_eq!(msg.tool_name, "echo");
        assert_eq!(msg.details["a"], 1);
    }
}
