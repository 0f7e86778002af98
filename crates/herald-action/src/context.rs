//! Execution context handed to every handler.
//!
//! The engine never inspects the context beyond the conversation ids it uses
//! to derive retry keys; the delivery channel is only used by handlers.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::HandlerError;

/// One outbound text delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<i64>,
    pub text: String,
}

/// Transport that actually puts a message on the wire.
///
/// Implementations return `HandlerError::Transient` for failures worth
/// retrying (rate limits, dropped connections) and `HandlerError::Failed`
/// for everything else.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, delivery: &Delivery) -> Result<(), HandlerError>;
}

/// Channel that only logs deliveries.
pub struct LogChannel;

#[async_trait]
impl DeliveryChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        tracing::info!(
            chat_id = delivery.chat_id,
            thread_id = ?delivery.thread_id,
            reply_to = ?delivery.reply_to,
            text_len = delivery.text.len(),
            "Message delivered"
        );
        Ok(())
    }
}

/// Channel that keeps every delivery in memory, oldest first.
#[derive(Default)]
pub struct MemoryChannel {
    deliveries: Mutex<Vec<Delivery>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DeliveryChannel for MemoryChannel {
    fn name(&self) -> &str {
        "memory"
    }

    async fn deliver(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delivery.clone());
        Ok(())
    }
}

/// Per-message context: the conversation the message arrived in and the
/// channel replies go out through.
#[derive(Clone)]
pub struct ExecutionContext {
    pub chat_id: Option<i64>,
    pub thread_id: Option<i64>,
    pub channel: Arc<dyn DeliveryChannel>,
}

impl ExecutionContext {
    pub fn new(channel: Arc<dyn DeliveryChannel>) -> Self {
        Self {
            chat_id: None,
            thread_id: None,
            channel,
        }
    }

    pub fn for_chat(chat_id: i64, thread_id: Option<i64>) -> Self {
        Self {
            chat_id: Some(chat_id),
            thread_id,
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
        self.channel = channel;
        self
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(Arc::new(LogChannel))
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("chat_id", &self.chat_id)
            .field("thread_id", &self.thread_id)
            .field("channel", &self.channel.name())
            .finish()
    }
}
