//! Command action handler.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::error::HandlerError;
use crate::handler::{decode, ActionHandler};
use crate::types::{ActionResult, ActionType, CommandPayload};

/// Dispatches a named command with positional arguments.
///
/// Commands are recorded, never executed on the host.
pub struct CommandHandler;

#[async_trait]
impl ActionHandler for CommandHandler {
    fn schema(&self) -> Option<ActionType> {
        Some(ActionType::Command)
    }

    async fn run(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ActionResult, HandlerError> {
        let command: CommandPayload = decode(params)?;
        let args = command.args.unwrap_or_default();

        tracing::info!(
            command = %command.name,
            args = args.len(),
            chat_id = ?ctx.chat_id,
            "Command dispatched"
        );

        Ok(ActionResult {
            message: format!("Command dispatched: {} ({} args)", command.name, args.len()),
            output: Some(Value::Array(args)),
        })
    }
}
