//! Core types and value objects for the action protocol.
//!
//! Defines the typed action kinds and their payloads, the envelope items
//! handed to handlers, and the per-action outcomes reported back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::ActionError;
use crate::schema;
use crate::state_machine::MessageState;

// =============================================================================
// Enums
// =============================================================================

/// The action kinds with a validated payload schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Message,
    Event,
    Command,
    Memory,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::Message,
        ActionType::Event,
        ActionType::Command,
        ActionType::Memory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Message => "message",
            ActionType::Event => "event",
            ActionType::Command => "command",
            ActionType::Memory => "memory",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(ActionType::Message),
            "event" => Ok(ActionType::Event),
            "command" => Ok(ActionType::Command),
            "memory" => Ok(ActionType::Memory),
            _ => Err(format!("unsupported type: {}", s)),
        }
    }
}

/// Visibility of a message: the current conversation or every conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Local,
    Global,
}

impl Scope {
    pub const NAMES: [&'static str; 2] = ["local", "global"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    Default,
    Private,
    Public,
}

impl Privacy {
    pub const NAMES: [&'static str; 3] = ["default", "private", "public"];
}

// =============================================================================
// Payloads
// =============================================================================

/// The message a reply is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub text: String,
    pub scope: Scope,
    pub privacy: Privacy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPayload {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// A schema-checked action with its payload decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TypedAction {
    Message(MessagePayload),
    Event(EventPayload),
    Command(CommandPayload),
    Memory(MemoryPayload),
}

impl TypedAction {
    /// Validate a raw `{type, payload}` value and decode it.
    ///
    /// Every schema violation is reported at once in `ActionError::Validation`.
    pub fn parse(value: &Value) -> Result<Self, ActionError> {
        let report = schema::validate(value);
        if !report.valid {
            return Err(ActionError::Validation(report.errors));
        }
        serde_json::from_value(value.clone()).map_err(|e| ActionError::Validation(vec![e.to_string()]))
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            TypedAction::Message(_) => ActionType::Message,
            TypedAction::Event(_) => ActionType::Event,
            TypedAction::Command(_) => ActionType::Command,
            TypedAction::Memory(_) => ActionType::Memory,
        }
    }
}

// =============================================================================
// Envelope and results
// =============================================================================

/// One entry of a message's `actions` list, after the envelope check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub action: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Result returned by a handler that completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl ActionResult {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            output: None,
        }
    }
}

/// Coarse classification of a failed action, for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownPlugin,
    InvalidPlugin,
    Validation,
    Handler,
    RetryExhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded { message: String },
    Failed { kind: FailureKind, reason: String },
    Skipped { reason: String },
}

impl OutcomeStatus {
    pub fn failed(err: &ActionError) -> Self {
        OutcomeStatus::Failed {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

/// What happened to one action of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Position in the message's `actions` list.
    pub index: usize,
    pub action: String,
    /// Handler invocations made, retries included.
    pub attempts: u32,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }
}

/// The result of processing one incoming message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReport {
    pub message_id: Uuid,
    pub state: MessageState,
    pub received_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub outcomes: Vec<ActionOutcome>,
}

impl MessageReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Failed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Skipped { .. }))
            .count()
    }
}

// =============================================================================
// Tests
// =============================================================================
