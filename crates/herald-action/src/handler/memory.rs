//! Memory action handler.
//!
//! Stores a short piece of content with optional tags.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::context::ExecutionContext;
use crate::error::HandlerError;
use crate::handler::{decode, ActionHandler};
use crate::types::{ActionResult, ActionType, MemoryPayload};

const PREVIEW_CHARS: usize = 50;

pub struct MemoryHandler;

#[async_trait]
impl ActionHandler for MemoryHandler {
    fn schema(&self) -> Option<ActionType> {
        Some(ActionType::Memory)
    }

    async fn run(
        &self,
        _ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ActionResult, HandlerError> {
        let memory: MemoryPayload = decode(params)?;
        let tags = memory.tags.unwrap_or_default();
        let preview: String = memory.content.chars().take(PREVIEW_CHARS).collect();

        tracing::info!(content_len = memory.content.len(), tags = ?tags, "Memory stored");

        Ok(ActionResult {
            message: format!("Memory stored: {}", preview),
            output: Some(json!({ "tags": tags })),
        })
    }
}
