//! Herald action protocol.
//!
//! Incoming messages carry an ordered list of named actions. This crate
//! parses the envelope, resolves each action name to a handler through the
//! plugin registry, validates typed payloads, dispatches the actions in order
//! and retries failed deliveries within a per-conversation budget.

pub mod context;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod retry;
pub mod schema;
pub mod state_machine;
pub mod types;

pub use context::{Delivery, DeliveryChannel, ExecutionContext, LogChannel, MemoryChannel};
pub use engine::ProtocolEngine;
pub use error::{ActionError, HandlerError, PluginError, ProtocolError};
pub use handler::{ActionHandler, BuiltinLoader, HandlerLoader, PluginModule, PluginRegistry};
pub use retry::{RetryKey, RetryRecord, RetryTracker};
pub use schema::{validate, ValidationReport};
pub use state_machine::MessageState;
pub use types::{
    ActionCall, ActionOutcome, ActionResult, ActionType, FailureKind, MessageReport,
    OutcomeStatus, TypedAction,
};
