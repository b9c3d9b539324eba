//! Per-turn context hooks.
//!
//! Before every model call the runner passes the history through
//! [`TransformContext`] (optional, agent-level messages in and out) and then
//! [`ConvertToLlm`] (required, agent-level messages down to LLM messages).

use async_trait::async_trait;
use strand_core::messages::{AgentMessage, Message};
use tokio_util::sync::CancellationToken;

/// Maps the agent history to what the model sees.
#[async_trait]
pub trait ConvertToLlm: Send + Sync {
    /// Convert `messages`. An error fails the run.
    async fn convert(&self, messages: &[AgentMessage]) -> anyhow::Result<Vec<Message>>;
}

/// Keeps `user`, `assistant` and `toolResult` messages and drops custom ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultConvertToLlm;

#[async_trait]
impl ConvertToLlm for DefaultConvertToLlm {
    async fn convert(&self, messages: &[AgentMessage]) -> anyhow::Result<Vec<Message>> {
        Ok(messages.iter().filter_map(AgentMessage::to_llm).collect())
    }
}

/// Synchronous conversion closures work as hooks.
#[async_trait]
impl<F> ConvertToLlm for F
where
    F: Fn(&[AgentMessage]) -> Vec<Message> + Send + Sync,
{
    async fn convert(&self, messages: &[AgentMessage]) -> anyhow::Result<Vec<Message>> {
        Ok(self(messages))
    }
}

/// Rewrites the agent history before conversion (pruning, injection).
///
/// The result is only used for the current model call; the stored history
/// is not modified.
#[async_trait]
pub trait TransformContext: Send + Sync {
    /// Transform `messages`. `cancel` fires when the run is aborted.
    async fn transform(
        &self,
        messages: Vec<AgentMessage>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<AgentMessage>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::messages::CustomMessage;

    fn history() -> Vec<AgentMessage> {
        vec![
            AgentMessage::user_text("hi"),
            AgentMessage::Custom(CustomMessage {
                kind: "notification".into(),
                payload: serde_json::json!({"text": "build finished"}),
                timestamp: 0,
            }),
        ]
    }

    #[tokio::test]
    async fn default_drops_custom_messages() {
        let out = DefaultConvertToLlm.convert(&history()).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].role(), "user");
    }

    #[tokio::test]
    async fn closure_hook_maps_custom_messages() {
        let hook = |messages: &[AgentMessage]| -> Vec<Message> {
            messages
                .iter()
                .filter_map(|m| match m {
                    AgentMessage::Custom(c) => Some(Message::User(strand_core::messages::UserMessage::text(
                        c.payload["text"].as_str().unwrap_or_default(),
                    ))),
                    other => other.to_llm(),
                })
                .collect()
        };
        let out = hook.convert(&history()).await.unwrap();
        assert_eq!(out.len(), 2);
    }
}
