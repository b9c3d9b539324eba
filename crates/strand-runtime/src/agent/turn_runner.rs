//! Turn runner: the agent loop.
//!
//! One run is a sequence of turns. Each turn streams one assistant message
//! and executes its tool calls in order. The loop continues while the last
//! turn requested tools or steering messages are waiting; once it would stop,
//! queued follow-ups restart it. A failed or aborted assistant message ends
//! the run immediately.

use std::sync::Arc;

use strand_core::content::ToolCall;
use strand_core::events::AgentEvent;
use strand_core::messages::{AgentMessage, AssistantMessage, Context, StopReason, ToolResultMessage};
use strand_core::model::Model;
use strand_core::tools::ToolOutcome;
use strand_llm::registry::stream_with_provider;
use strand_llm::{IdRemapFn, ProviderError, normalize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::agent::Agent;
use crate::agent::stream_processor::process_stream;
use crate::tools::executor::{execute_tool_call, into_result};
use crate::tools::{AgentTool, definitions};

/// Text of the error result given to tool calls skipped for steering.
pub const SKIPPED_TEXT: &str = "Skipped due to queued user message.";

/// Run turns until the agent stops.
///
/// Provider, hook and tool failures are all recorded as messages.
#[instrument(skip_all, fields(prompts = prompts.len()))]
pub(crate) async fn run_loop(agent: &Agent, prompts: Vec<AgentMessage>, cancel: &CancellationToken) {
    let mut new_messages: Vec<AgentMessage> = Vec::with_capacity(prompts.len() + 2);

    agent.dispatch(AgentEvent::AgentStart);
    agent.dispatch(AgentEvent::TurnStart);
    for prompt in prompts {
        append(agent, prompt, &mut new_messages);
    }

    let mut first_turn = true;
    let mut turn = 0u32;
    let mut pending = agent.steering.drain();

    loop {
        let mut has_more_tool_calls = true;

        while has_more_tool_calls || !pending.is_empty() {
            if first_turn {
                first_turn = false;
            } else {
                agent.dispatch(AgentEvent::TurnStart);
            }
            turn += 1;

            for message in std::mem::take(&mut pending) {
                append(agent, message, &mut new_messages);
            }

            // Snapshot per turn; setters take effect from the next turn.
            let (model, tools) = {
                let state = agent.state.read();
                (state.model.clone(), state.tools.clone())
            };

            let message = match stream_assistant_response(agent, &model, &tools, cancel).await {
                Ok(message) => message,
                Err(e) => {
                    let reason = if cancel.is_cancelled() {
                        StopReason::Aborted
                    } else {
                        StopReason::Error
                    };
                    let text = format!("{e:#}");
                    error!(error = %text, stop_reason = %reason, "context hook failed");
                    emit_failure(agent, &model, reason, text)
                }
            };
            new_messages.push(AgentMessage::Assistant(message.clone()));

            if message.stop_reason.is_failure() {
                info!(turn, stop_reason = %message.stop_reason, "turn ended with failure");
                agent.dispatch(AgentEvent::TurnEnd {
                    message: message.into(),
                    tool_results: Vec::new(),
                });
                agent.dispatch(AgentEvent::AgentEnd { messages: new_messages });
                return;
            }

            has_more_tool_calls = message.has_tool_calls();
            let (tool_results, steering) = if has_more_tool_calls {
                execute_tool_calls(agent, &tools, &message, cancel).await
            } else {
                (Vec::new(), Vec::new())
            };
            new_messages.extend(tool_results.iter().cloned().map(AgentMessage::ToolResult));

            info!(
                turn,
                model = %model.id,
                stop_reason = %message.stop_reason,
                tools = tool_results.len(),
                "turn completed"
            );
            agent.dispatch(AgentEvent::TurnEnd {
                message: message.into(),
                tool_results,
            });

            pending = if steering.is_empty() {
                agent.steering.drain()
            } else {
                steering
            };
        }

        let follow_ups = agent.follow_up.drain();
        if follow_ups.is_empty() {
            break;
        }
        debug!(count = follow_ups.len(), "continuing with follow-up messages");
        pending = follow_ups;
    }

    agent.dispatch(AgentEvent::AgentEnd { messages: new_messages });
}

/// Emit `message` as a complete message and record it for `agent_end`.
fn append(agent: &Agent, message: AgentMessage, new_messages: &mut Vec<AgentMessage>) {
    agent.dispatch(AgentEvent::MessageStart {
        message: message.clone(),
    });
    agent.dispatch(AgentEvent::MessageEnd {
        message: message.clone(),
    });
    new_messages.push(message);
}

/// Build the context for this turn, call the provider, and stream the reply.
///
/// Errors are context hook failures; provider failures come back as
/// messages.
async fn stream_assistant_response(
    agent: &Agent,
    model: &Model,
    tools: &[Arc<dyn AgentTool>],
    cancel: &CancellationToken,
) -> anyhow::Result<AssistantMessage> {
    let (system_prompt, thinking_level, messages) = {
        let state = agent.state.read();
        (state.system_prompt.clone(), state.thinking_level, state.messages.clone())
    };

    let messages = match &agent.transform_context {
        Some(hook) => hook.transform(messages, cancel).await?,
        None => messages,
    };
    let llm_messages = agent.convert_to_llm.convert(&messages).await?;

    let Some(provider) = agent.registry.resolve(model) else {
        let err = ProviderError::NoProvider {
            provider: model.provider.clone(),
            api: model.api.clone(),
        };
        error!(error = %err, category = err.category(), "no provider for model");
        return Ok(emit_failure(agent, model, StopReason::Error, err.to_string()));
    };

    let remap = provider
        .tool_call_id_syntax(model)
        .map(|syntax| move |id: &str, _: &Model, _: &AssistantMessage| syntax.normalize(id));
    let id_remap = remap.as_ref().map(|f| f as &IdRemapFn<'_>);

    let context = Context {
        system_prompt: (!system_prompt.is_empty()).then_some(system_prompt),
        messages: normalize(&llm_messages, model, id_remap),
        tools: definitions(tools),
    };
    let options = agent.request.stream_options(thinking_level, cancel.child_token());

    debug!(messages = context.messages.len(), tools = context.tools.len(), "requesting model stream");
    match stream_with_provider(provider.as_ref(), model, &context, &options).await {
        Ok(stream) => Ok(process_stream(stream, model, cancel, &|event| agent.dispatch(event)).await),
        Err(e) => {
            let reason = if matches!(e, ProviderError::Cancelled) || cancel.is_cancelled() {
                StopReason::Aborted
            } else {
                StopReason::Error
            };
            error!(error = %e, category = e.category(), "provider stream failed to start");
            Ok(emit_failure(agent, model, reason, e.to_string()))
        }
    }
}

/// Record an assistant message for a stream that never started.
fn emit_failure(agent: &Agent, model: &Model, reason: StopReason, text: String) -> AssistantMessage {
    let message = AssistantMessage::failure(model, reason, text);
    agent.dispatch(AgentEvent::MessageStart {
        message: message.clone().into(),
    });
    agent.dispatch(AgentEvent::MessageEnd {
        message: message.clone().into(),
    });
    message
}

/// Run the message's tool calls in order.
///
/// Steering is checked after every call; when messages are waiting, the
/// remaining calls are skipped and the drained messages are returned.
async fn execute_tool_calls(
    agent: &Agent,
    tools: &[Arc<dyn AgentTool>],
    message: &AssistantMessage,
    cancel: &CancellationToken,
) -> (Vec<ToolResultMessage>, Vec<AgentMessage>) {
    let calls: Vec<ToolCall> = message.tool_calls().cloned().collect();
    let mut results = Vec::with_capacity(calls.len());

    for (i, call) in calls.iter().enumerate() {
        agent.dispatch(AgentEvent::ToolExecutionStart {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            args: call.arguments.clone(),
        });

        let on_progress = |partial: ToolOutcome| {
            agent.dispatch(AgentEvent::ToolExecutionUpdate {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                args: call.arguments.clone(),
                partial_result: partial,
            });
        };
        let result = execute_tool_call(tools, call, cancel, Some(&on_progress)).await;
        let (result_message, outcome, is_error) = into_result(call, result);
        results.push(finish_tool_call(agent, call, result_message, outcome, is_error));

        let steering = agent.steering.drain();
        if !steering.is_empty() {
            let skipped = &calls[i + 1..];
            debug!(skipped = skipped.len(), "steering message queued, skipping remaining tool calls");
            for call in skipped {
                agent.dispatch(AgentEvent::ToolExecutionStart {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    args: call.arguments.clone(),
                });
                let result_message = ToolResultMessage::error(call, SKIPPED_TEXT);
                results.push(finish_tool_call(agent, call, result_message, ToolOutcome::text(SKIPPED_TEXT), true));
            }
            return (results, steering);
        }
    }

    (results, Vec::new())
}

fn finish_tool_call(
    agent: &Agent,
    call: &ToolCall,
    result_message: ToolResultMessage,
    outcome: ToolOutcome,
    is_error: bool,
) -> ToolResultMessage {
    agent.dispatch(AgentEvent::ToolExecutionEnd {
        tool_call_id: call.id.clone(),
        tool_name: call.name.clone(),
        result: outcome,
        is_error,
    });
    agent.dispatch(AgentEvent::MessageStart {
        message: result_message.clone().into(),
    });
    agent.dispatch(AgentEvent::MessageEnd {
        message: result_message.clone().into(),
    });
    result_message
}
