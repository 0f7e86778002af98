//! Message action handler.
//!
//! Sends text to a chat through the context's delivery channel.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::{Delivery, ExecutionContext};
use crate::error::HandlerError;
use crate::handler::ActionHandler;
use crate::retry::RetryKey;
use crate::types::ActionResult;

/// Handler for outbound text messages.
///
/// Accepts loose params (`text`, `chat_id`, `thread_id`, `reply_to`) as well
/// as the typed message payload shape (`text`, `target`).
pub struct MessageHandler;

#[async_trait]
impl ActionHandler for MessageHandler {
    async fn run(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ActionResult, HandlerError> {
        let text = params
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("");

        if text.is_empty() {
            return Err(HandlerError::InvalidParams(
                "message action requires non-empty text".to_string(),
            ));
        }

        let destination = RetryKey::resolve(params, ctx).ok_or_else(|| {
            HandlerError::InvalidParams("message action requires a chat_id".to_string())
        })?;

        let reply_to = params.get("reply_to").and_then(Value::as_i64).or_else(|| {
            params
                .get("target")
                .and_then(|t| t.get("message_id"))
                .and_then(Value::as_i64)
        });

        let delivery = Delivery {
            chat_id: destination.chat_id,
            thread_id: destination.thread_id,
            reply_to,
            text: text.to_string(),
        };

        ctx.channel.deliver(&delivery).await?;

        Ok(ActionResult {
            message: format!("Message delivered to chat {}", delivery.chat_id),
            output: serde_json::to_value(&delivery).ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryChannel;
    use serde_json::json;
    use std::sync::Arc;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn memory_ctx() -> (ExecutionContext, Arc<MemoryChannel>) {
        let channel = Arc::new(MemoryChannel::new());
        let ctx = ExecutionContext::default().with_channel(channel.clone());
        (ctx, channel)
    }

    #[tokio::test]
    async fn test_message_delivered() {
        let (ctx, channel) = memory_ctx();
        let result = MessageHandler
            .run(&ctx, &params(json!({"text": "hi", "chat_id": 1})))
            .await
            .unwrap();
        assert_eq!(result.message, "Message delivered to chat 1");
        assert_eq!(
            channel.deliveries(),
            vec![Delivery {
                chat_id: 1,
                thread_id: None,
                reply_to: None,
                text: "hi".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_message_uses_typed_target() {
        let (ctx, channel) = memory_ctx();
        MessageHandler
            .run(
                &ctx,
                &params(json!({
                    "text": "re",
                    "scope": "local",
                    "privacy": "default",
                    "target": {"chat_id": 9, "message_id": 44}
                })),
            )
            .await
            .unwrap();
        let sent = &channel.deliveries()[0];
        assert_eq!(sent.chat_id, 9);
        assert_eq!(sent.reply_to, Some(44));
    }

    #[tokio::test]
    async fn test_message_falls_back_to_context_chat() {
        let channel = Arc::new(MemoryChannel::new());
        let ctx = ExecutionContext::for_chat(3, Some(12)).with_channel(channel.clone());
        MessageHandler
            .run(&ctx, &params(json!({"text": "in topic"})))
            .await
            .unwrap();
        let sent = &channel.deliveries()[0];
        assert_eq!((sent.chat_id, sent.thread_id), (3, Some(12)));
    }

    #[tokio::test]
    async fn test_message_empty_params_rejected() {
        let (ctx, channel) = memory_ctx();
        let err = MessageHandler.run(&ctx, &Map::new()).await.unwrap_err();
        assert_eq!(
            err,
            HandlerError::InvalidParams("message action requires non-empty text".to_string())
        );
        assert!(channel.deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_message_without_chat_rejected() {
        let (ctx, _) = memory_ctx();
        let err = MessageHandler
            .run(&ctx, &params(json!({"text": "lost"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chat_id"));
    }

    #[test]
    fn test_message_has_no_schema() {
        assert_eq!(MessageHandler.schema(), None);
    }
}
