//! Protocol engine.
//!
//! Coordinates the full pipeline for one incoming message: envelope parsing,
//! handler resolution, schema checks for typed handlers, sequential dispatch
//! and retry of failed deliveries.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use herald_core::config::{EngineConfig, HeraldConfig, OnError, RetryConfig};

use crate::context::ExecutionContext;
use crate::envelope;
use crate::error::{ActionError, HandlerError, ProtocolError};
use crate::handler::{ActionHandler, PluginRegistry};
use crate::retry::{RetryKey, RetryTracker};
use crate::schema;
use crate::state_machine::{validate_transition, MessageState};
use crate::types::{
    ActionCall, ActionOutcome, ActionResult, FailureKind, MessageReport, OutcomeStatus,
};

/// Entry point for processing wire messages.
///
/// One engine is shared by every concurrent message flow; the registry and
/// retry tracker it owns are internally synchronised.
pub struct ProtocolEngine {
    registry: Arc<PluginRegistry>,
    tracker: Arc<RetryTracker>,
    engine: EngineConfig,
    retry: RetryConfig,
}

impl ProtocolEngine {
    /// Create an engine with a fresh retry tracker sized from `config`.
    pub fn new(registry: Arc<PluginRegistry>, config: &HeraldConfig) -> Self {
        let tracker = Arc::new(RetryTracker::from_config(&config.retry));
        Self::with_tracker(registry, tracker, config.engine.clone(), config.retry.clone())
    }

    pub fn with_tracker(
        registry: Arc<PluginRegistry>,
        tracker: Arc<RetryTracker>,
        engine: EngineConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            registry,
            tracker,
            engine,
            retry,
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<RetryTracker> {
        &self.tracker
    }

    /// Process one raw message.
    ///
    /// Returns `Err` only for envelope problems, in which case no action ran.
    /// Every per-action failure is reported inside the `MessageReport`.
    pub async fn process(
        &self,
        raw: &str,
        ctx: &ExecutionContext,
    ) -> Result<MessageReport, ProtocolError> {
        let message_id = Uuid::new_v4();
        let span = tracing::info_span!("message", %message_id);
        self.process_inner(message_id, raw, ctx)
            .instrument(span)
            .await
    }

    async fn process_inner(
        &self,
        message_id: Uuid,
        raw: &str,
        ctx: &ExecutionContext,
    ) -> Result<MessageReport, ProtocolError> {
        let received_at = Utc::now();
        let mut state = MessageState::Received;

        let root: Value = match serde_json::from_str(raw) {
            Ok(root) => root,
            Err(e) => {
                advance(&mut state, MessageState::Failed)?;
                tracing::warn!(error = %e, "Rejected undecodable message");
                return Err(ProtocolError::Parse(format!("malformed input: {}", e)));
            }
        };
        advance(&mut state, MessageState::Parsed)?;

        let calls = match envelope::parse_value(&root) {
            Ok(calls) => calls,
            Err(e) => {
                advance(&mut state, MessageState::Failed)?;
                tracing::warn!(error = %e, "Rejected malformed envelope");
                return Err(e);
            }
        };
        advance(&mut state, MessageState::Validated)?;
        advance(&mut state, MessageState::Dispatching)?;

        let mut outcomes = Vec::with_capacity(calls.len());
        let mut halted = false;
        for (index, call) in calls.iter().enumerate() {
            if halted {
                outcomes.push(ActionOutcome {
                    index,
                    action: call.action.clone(),
                    attempts: 0,
                    status: OutcomeStatus::Skipped {
                        reason: "previous action failed".to_string(),
                    },
                });
                continue;
            }

            let outcome = self.dispatch(index, call, ctx).await;
            if !outcome.is_success() && self.engine.on_error == OnError::Stop {
                halted = true;
            }
            outcomes.push(outcome);
        }

        // Only a failed resolution fails the message; handler failures and
        // skips stay per-action outcomes.
        let unresolved = outcomes.iter().any(|o| {
            matches!(
                o.status,
                OutcomeStatus::Failed {
                    kind: FailureKind::UnknownPlugin | FailureKind::InvalidPlugin,
                    ..
                }
            )
        });
        let terminal = if unresolved {
            MessageState::Failed
        } else {
            MessageState::Completed
        };
        advance(&mut state, terminal)?;

        let report = MessageReport {
            message_id,
            state,
            received_at,
            completed_at: Utc::now(),
            outcomes,
        };

        tracing::info!(
            state = %report.state,
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Message processed"
        );

        Ok(report)
    }

    /// Resolve, check and run one action, retrying transient delivery failures.
    async fn dispatch(&self, index: usize, call: &ActionCall, ctx: &ExecutionContext) -> ActionOutcome {
        let outcome = |attempts: u32, status: OutcomeStatus| ActionOutcome {
            index,
            action: call.action.clone(),
            attempts,
            status,
        };

        let handler = match self.registry.resolve(&call.action) {
            Ok(handler) => handler,
            Err(e) => {
                tracing::warn!(action = %call.action, error = %e, "Handler resolution failed");
                return outcome(0, OutcomeStatus::failed(&e.into()));
            }
        };

        if let Some(kind) = handler.schema() {
            let report = schema::validate(&json!({
                "type": kind.as_str(),
                "payload": Value::Object(call.params.clone()),
            }));
            if !report.valid {
                let err = ActionError::Validation(report.errors);
                tracing::warn!(action = %call.action, error = %err, "Action rejected");
                return outcome(0, OutcomeStatus::failed(&err));
            }
        }

        let retry_key = if self.engine.is_delivery(&call.action) {
            RetryKey::resolve(&call.params, ctx)
        } else {
            None
        };

        let mut attempts = 0u32;
        let mut retries = 0u32;
        loop {
            attempts += 1;
            tracing::debug!(action = %call.action, attempt = attempts, "Dispatching action");

            let err = match self.invoke(handler.as_ref(), ctx, call).await {
                Ok(result) => {
                    return outcome(
                        attempts,
                        OutcomeStatus::Succeeded {
                            message: result.message,
                        },
                    )
                }
                Err(err) => err,
            };

            let key = match retry_key {
                Some(key) if err.is_transient() => key,
                _ => {
                    tracing::warn!(action = %call.action, error = %err, "Action failed");
                    return outcome(attempts, OutcomeStatus::failed(&err.into()));
                }
            };

            match self.tracker.try_reserve(&key, self.retry.max_attempts) {
                Some(used) => {
                    retries += 1;
                    let delay = self.retry.backoff(retries);
                    tracing::info!(
                        action = %call.action,
                        chat_id = key.chat_id,
                        thread_id = ?key.thread_id,
                        used,
                        budget = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying delivery"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                None => {
                    let err = ActionError::RetryExhausted {
                        retries,
                        last_error: err,
                    };
                    tracing::warn!(
                        action = %call.action,
                        chat_id = key.chat_id,
                        thread_id = ?key.thread_id,
                        error = %err,
                        "Retry budget exhausted"
                    );
                    return outcome(attempts, OutcomeStatus::failed(&err));
                }
            }
        }
    }

    async fn invoke(
        &self,
        handler: &dyn ActionHandler,
        ctx: &ExecutionContext,
        call: &ActionCall,
    ) -> Result<ActionResult, HandlerError> {
        match self.engine.handler_timeout() {
            Some(limit) => tokio::time::timeout(limit, handler.run(ctx, &call.params))
                .await
                .unwrap_or_else(|_| Err(HandlerError::Timeout(limit.as_secs()))),
            None => handler.run(ctx, &call.params).await,
        }
    }
}

fn advance(state: &mut MessageState, next: MessageState) -> Result<(), ProtocolError> {
    validate_transition(*state, next)?;
    *state = next;
    Ok(())
}
