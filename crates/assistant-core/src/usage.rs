//! Usage Accounting
//!
//! Token usage is recorded off the request path: the loop enqueues a
//! [`UsageRecord`] on a bounded channel and a detached worker forwards it to
//! the [`UsageSink`]. Recording never blocks and never fails the caller.
//! Records are dropped when the queue is full, and any still queued when the
//! runtime shuts down are lost.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{AssistantError, Result};

/// Default queue depth for [`UsageRecorder::spawn`]
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// One completed loop's token consumption
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub model: String,
    pub department: Option<String>,
    pub user_id: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Destination for usage records (database, metrics, ...)
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: &UsageRecord) -> Result<()>;
}

/// Non-blocking handle that enqueues usage records
#[derive(Clone)]
pub struct UsageRecorder {
    tx: Option<mpsc::Sender<UsageRecord>>,
    dropped: Arc<AtomicU64>,
}

impl UsageRecorder {
    /// Start the forwarding worker on the current Tokio runtime
    pub fn spawn(sink: Arc<dyn UsageSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (recorder, mut rx) = Self::channel(capacity);

        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = sink.record(&record).await {
                    tracing::warn!(
                        model = %record.model,
                        department = ?record.department,
                        error = %e,
                        "Usage sink rejected record"
                    );
                }
            }
            tracing::debug!("Usage recorder drained");
        });

        (recorder, handle)
    }

    /// Recorder that discards everything
    pub fn disabled() -> Self {
        Self {
            tx: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<UsageRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx: Some(tx),
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Enqueue a record; drops it if the queue is full or closed
    pub fn record(&self, record: UsageRecord) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(model = %record.model, "Usage queue full, dropping record");
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(model = %record.model, "Usage recorder closed, dropping record");
            }
        }
    }

    /// Number of records dropped so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Aggregated token counts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Records kept by [`InMemoryUsageSink::new`]
pub const DEFAULT_RECENT_RECORDS: usize = 256;

/// Department key for records that carry none
const UNASSIGNED: &str = "unassigned";

#[derive(Default)]
struct Ledger {
    totals: BTreeMap<String, UsageTotals>,
    recent: VecDeque<UsageRecord>,
}

/// In-memory sink (for development/testing)
///
/// Totals run for the life of the sink; only the latest records are kept.
pub struct InMemoryUsageSink {
    ledger: Mutex<Ledger>,
    keep: usize,
}

impl Default for InMemoryUsageSink {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUsageSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RECENT_RECORDS)
    }

    /// Keep at most `keep` recent records (at least one)
    pub fn with_capacity(keep: usize) -> Self {
        let keep = keep.max(1);
        Self {
            ledger: Mutex::new(Ledger {
                totals: BTreeMap::new(),
                recent: VecDeque::with_capacity(keep),
            }),
            keep,
        }
    }

    fn ledger(&self) -> Result<std::sync::MutexGuard<'_, Ledger>> {
        self.ledger
            .lock()
            .map_err(|e| AssistantError::Storage(e.to_string()))
    }

    /// Most recent records, oldest first
    pub fn records(&self) -> Result<Vec<UsageRecord>> {
        Ok(self.ledger()?.recent.iter().cloned().collect())
    }

    /// Totals keyed by department (`"unassigned"` when absent)
    pub fn totals_by_department(&self) -> Result<BTreeMap<String, UsageTotals>> {
        Ok(self.ledger()?.totals.clone())
    }
}

#[async_trait]
impl UsageSink for InMemoryUsageSink {
    async fn record(&self, record: &UsageRecord) -> Result<()> {
        let mut ledger = self.ledger()?;

        let key = record.department.as_deref().unwrap_or(UNASSIGNED);
        let entry = ledger.totals.entry(key.to_string()).or_default();
        entry.requests += 1;
        entry.input_tokens = entry.input_tokens.saturating_add(record.input_tokens);
        entry.output_tokens = entry.output_tokens.saturating_add(record.output_tokens);

        if ledger.recent.len() == self.keep {
            ledger.recent.pop_front();
        }
        ledger.recent.push_back(record.clone());
        Ok(())
    }
}
