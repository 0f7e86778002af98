//! Error types for the action protocol.

use herald_core::error::HeraldError;

use crate::state_machine::MessageState;
use crate::types::FailureKind;

/// Message-fatal errors: nothing in the message is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid message state transition: {0} -> {1}")]
    InvalidTransition(MessageState, MessageState),
}

impl From<ProtocolError> for HeraldError {
    fn from(err: ProtocolError) -> Self {
        HeraldError::Protocol(err.to_string())
    }
}

/// Errors from resolving an action name to a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error("unknown plugin: {0}")]
    Unknown(String),
    #[error("invalid plugin '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

/// Errors raised by a handler while running an action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    InvalidParams(String),
    /// A delivery failure that may succeed if attempted again.
    #[error("transient delivery failure: {0}")]
    Transient(String),
    #[error("handler failed: {0}")]
    Failed(String),
    #[error("handler timed out after {0} seconds")]
    Timeout(u64),
}

impl HandlerError {
    /// Whether the engine may consult the retry budget for this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, HandlerError::Transient(_) | HandlerError::Timeout(_))
    }
}

/// A per-action failure. Never fatal for the message as a whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error("retries exhausted after {retries} retries: {last_error}")]
    RetryExhausted { retries: u32, last_error: HandlerError },
}

impl ActionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ActionError::Plugin(PluginError::Unknown(_)) => FailureKind::UnknownPlugin,
            ActionError::Plugin(PluginError::Invalid { .. }) => FailureKind::InvalidPlugin,
            ActionError::Validation(_) => FailureKind::Validation,
            ActionError::Handler(_) => FailureKind::Handler,
            ActionError::RetryExhausted { .. } => FailureKind::RetryExhausted,
        }
    }
}
