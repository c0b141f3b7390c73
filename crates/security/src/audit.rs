//! Audit logging: structured record of financial events.
//!
//! `AuditLogger::log` never blocks and never fails: entries are kept in a
//! bounded in-memory buffer and pushed onto a bounded queue. A background
//! task drains the queue into the configured sinks, retrying each sink a
//! bounded number of times before dropping the entry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stashflow_config::AuditConfig;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Entries kept in memory for inspection (`status`, tests).
const RETAINED_ENTRIES: usize = 1000;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub actor: String,
    pub target: String,
    pub outcome: AuditOutcome,
    pub details: Option<String>,
}

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A chat user was registered
    UserRegistered,
    /// A recurring income was removed
    IncomeDeleted { income_id: i64 },
    /// A monthly expense was removed
    ExpenseDeleted { expense_id: i64 },
    /// A savings goal was created
    GoalCreated { goal_id: i64 },
    /// A savings goal was deleted
    GoalDeleted { goal_id: i64 },
    /// A goal moved to a different priority
    PriorityChanged { goal_id: i64, from: u32, to: u32 },
    /// Money was put into a goal
    ContributionApplied { goal_id: i64, amount: i64 },
    /// Money was taken out of a goal
    WithdrawalApplied { goal_id: i64, amount: i64 },
    /// A payday notification was dispatched
    PaydayNotified { income_id: i64 },
    /// A sender was blocked by the channel allowlist
    SenderBlocked { channel: String },
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Audit sink {sink} failed: {reason}")]
    SinkFailed { sink: String, reason: String },
}

/// Where audit entries are written.
#[async_trait]
pub trait AuditSink: Send + Sync {
    fn name(&self) -> &str;

    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Audit logger with a bounded buffer and an optional background writer.
pub struct AuditLogger {
    enabled: bool,
    entries: Mutex<VecDeque<AuditEntry>>,
    queue: Option<mpsc::Sender<AuditEntry>>,
    dropped: AtomicU64,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("enabled", &self.enabled)
            .field("entry_count", &self.count())
            .field("has_writer", &self.queue.is_some())
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Logger that only keeps entries in memory.
    pub fn new() -> Self {
        Self {
            enabled: true,
            entries: Mutex::new(VecDeque::new()),
            queue: None,
            dropped: AtomicU64::new(0),
        }
    }

    /// Logger that records nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Logger with a background writer draining into `sinks`.
    ///
    /// Must be called from within a tokio runtime. The writer exits once
    /// the logger is dropped and the queue is empty.
    pub fn spawn(
        sinks: Vec<Arc<dyn AuditSink>>,
        queue_capacity: usize,
        max_retries: u32,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let logger = Arc::new(Self {
            queue: Some(tx),
            ..Self::new()
        });
        let handle = tokio::spawn(drain(rx, sinks, max_retries));
        (logger, handle)
    }

    /// Build from the `[audit]` config section.
    pub fn from_config(config: &AuditConfig, sinks: Vec<Arc<dyn AuditSink>>) -> Arc<Self> {
        if !config.enabled {
            return Arc::new(Self::disabled());
        }
        let (logger, _writer) = Self::spawn(sinks, config.queue_capacity, config.max_retries);
        logger
    }

    /// Record an audit event.
    pub fn log(
        &self,
        event: AuditEvent,
        actor: &str,
        target: &str,
        outcome: AuditOutcome,
        details: Option<String>,
    ) {
        if !self.enabled {
            return;
        }

        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            actor: actor.into(),
            target: target.into(),
            outcome,
            details,
        };

        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if entries.len() >= RETAINED_ENTRIES {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        if let Some(queue) = &self.queue {
            match queue.try_send(entry) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(entry)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(event = ?entry.event, "Audit queue full, entry dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Audit writer stopped, entry kept in memory only");
                }
            }
        }
    }

    /// Get all retained entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Get entries filtered by outcome.
    pub fn entries_by_outcome(&self, outcome: &AuditOutcome) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| &e.outcome == outcome)
            .cloned()
            .collect()
    }

    /// Count of retained entries.
    pub fn count(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Entries that never reached the writer queue.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn drain(
    mut rx: mpsc::Receiver<AuditEntry>,
    sinks: Vec<Arc<dyn AuditSink>>,
    max_retries: u32,
) {
    while let Some(entry) = rx.recv().await {
        for sink in &sinks {
            deliver(sink.as_ref(), &entry, max_retries).await;
        }
    }
    tracing::debug!("Audit writer finished");
}

async fn deliver(sink: &dyn AuditSink, entry: &AuditEntry, max_retries: u32) {
    let mut attempt = 0;
    loop {
        match sink.record(entry).await {
            Ok(()) => return,
            Err(e) if attempt < max_retries => {
                attempt += 1;
                tracing::debug!(sink = sink.name(), attempt, "Audit write failed, retrying: {e}");
                tokio::time::sleep(Duration::from_millis(20 * u64::from(attempt))).await;
            }
            Err(e) => {
                tracing::warn!(
                    sink = sink.name(),
                    event = ?entry.event,
                    "Audit entry dropped after {} attempts: {e}",
                    attempt + 1
                );
                return;
            }
        }
    }
}

/// A tracing-based audit sink that logs entries via `tracing::info!`.
pub struct TracingSink;

#[async_trait]
impl AuditSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        tracing::info!(
            event = ?entry.event,
            actor = %entry.actor,
            target = %entry.target,
            outcome = ?entry.outcome,
            details = ?entry.details,
            "AUDIT"
        );
        Ok(())
    }
}
