//! Delivery retry budget keyed by conversation context.
//!
//! Every `(chat_id, thread_id)` pair owns one attempt counter. Counters that
//! have been idle for longer than the retention window are dropped lazily on
//! the next tracker operation, so a quiet conversation starts fresh.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use herald_core::config::RetryConfig;

use crate::context::ExecutionContext;

/// Identity of a delivery context. A missing thread is `None`, never a
/// stringly sentinel, so it cannot collide with a real thread id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryKey {
    pub chat_id: i64,
    pub thread_id: Option<i64>,
}

impl RetryKey {
    pub fn new(chat_id: i64, thread_id: Option<i64>) -> Self {
        Self { chat_id, thread_id }
    }

    /// Derive the key for an action from its params, falling back to the
    /// conversation carried by the execution context.
    ///
    /// Returns `None` when no chat can be identified.
    pub fn resolve(params: &Map<String, Value>, ctx: &ExecutionContext) -> Option<Self> {
        let explicit_chat = params.get("chat_id").and_then(Value::as_i64).or_else(|| {
            params
                .get("target")
                .and_then(|t| t.get("chat_id"))
                .and_then(Value::as_i64)
        });
        let chat_id = explicit_chat.or(ctx.chat_id)?;

        let thread_id = params
            .get("thread_id")
            .and_then(Value::as_i64)
            .or_else(|| params.get("message_thread_id").and_then(Value::as_i64))
            .or_else(|| {
                // The context's thread only applies to the context's chat.
                (Some(chat_id) == ctx.chat_id)
                    .then_some(ctx.thread_id)
                    .flatten()
            });

        Some(Self { chat_id, thread_id })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryRecord {
    pub attempt_count: u32,
    pub last_seen: Instant,
}

/// In-memory retry bookkeeping shared by every message-processing flow.
///
/// A single mutex serialises all read-modify-write sequences; contention is
/// expected to be low.
pub struct RetryTracker {
    retention: Duration,
    records: Mutex<HashMap<RetryKey, RetryRecord>>,
}

impl RetryTracker {
    pub const DEFAULT_RETENTION: Duration = Duration::from_secs(300);

    pub fn new() -> Self {
        Self::with_retention(Self::DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            retention,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::with_retention(config.retention())
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// `true` iff the key has used fewer than `max_attempts` attempts.
    pub fn should_retry(&self, key: &RetryKey, max_attempts: u32) -> bool {
        self.should_retry_at(key, max_attempts, Instant::now())
    }

    pub fn should_retry_at(&self, key: &RetryKey, max_attempts: u32, now: Instant) -> bool {
        let mut records = self.lock();
        self.evict_expired(&mut records, now);
        let count = records.get(key).map_or(0, |r| r.attempt_count);
        count < max_attempts
    }

    /// Count one more attempt for the key and return the new total.
    pub fn record_attempt(&self, key: &RetryKey) -> u32 {
        self.record_attempt_at(key, Instant::now())
    }

    pub fn record_attempt_at(&self, key: &RetryKey, now: Instant) -> u32 {
        let mut records = self.lock();
        self.evict_expired(&mut records, now);
        Self::bump(&mut records, key, now)
    }

    /// Check the budget and take one attempt from it in one step.
    ///
    /// Returns the new attempt count, or `None` when the budget is spent.
    /// Concurrent callers can never overdraw the budget.
    pub fn try_reserve(&self, key: &RetryKey, max_attempts: u32) -> Option<u32> {
        self.try_reserve_at(key, max_attempts, Instant::now())
    }

    pub fn try_reserve_at(&self, key: &RetryKey, max_attempts: u32, now: Instant) -> Option<u32> {
        let mut records = self.lock();
        self.evict_expired(&mut records, now);
        let count = records.get(key).map_or(0, |r| r.attempt_count);
        if count >= max_attempts {
            return None;
        }
        Some(Self::bump(&mut records, key, now))
    }

    /// Snapshot of the live record for a key, if any.
    pub fn record(&self, key: &RetryKey) -> Option<RetryRecord> {
        self.record_at(key, Instant::now())
    }

    pub fn record_at(&self, key: &RetryKey, now: Instant) -> Option<RetryRecord> {
        let mut records = self.lock();
        self.evict_expired(&mut records, now);
        records.get(key).copied()
    }

    /// Number of records currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bump(records: &mut HashMap<RetryKey, RetryRecord>, key: &RetryKey, now: Instant) -> u32 {
        let record = records.entry(*key).or_insert(RetryRecord {
            attempt_count: 0,
            last_seen: now,
        });
        record.attempt_count = record.attempt_count.saturating_add(1);
        record.last_seen = now;
        record.attempt_count
    }

    fn evict_expired(&self, records: &mut HashMap<RetryKey, RetryRecord>, now: Instant) {
        let before = records.len();
        records.retain(|_, r| now.saturating_duration_since(r.last_seen) <= self.retention);
        let evicted = before - records.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Expired retry records evicted");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RetryKey, RetryRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RetryTracker {
    fn default() -> Self {
        Self::new()
    }
}
