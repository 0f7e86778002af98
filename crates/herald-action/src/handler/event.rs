//! Event action handler.
//!
//! Fires a named event with optional parameters.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::error::HandlerError;
use crate::handler::{decode, ActionHandler};
use crate::types::{ActionResult, ActionType, EventPayload};

pub struct EventHandler;

#[async_trait]
impl ActionHandler for EventHandler {
    fn schema(&self) -> Option<ActionType> {
        Some(ActionType::Event)
    }

    async fn run(
        &self,
        _ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ActionResult, HandlerError> {
        let event: EventPayload = decode(params)?;
        let parameters = event.parameters.unwrap_or_default();

        tracing::info!(event = %event.name, parameters = parameters.len(), "Event fired");

        Ok(ActionResult {
            message: format!("Event fired: {}", event.name),
            output: Some(Value::Object(parameters)),
        })
    }
}
