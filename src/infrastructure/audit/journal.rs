//! Buffered, date-partitioned audit journal
//!
//! `record` only touches memory and the log stream. Durable writes happen in
//! `flush`, which drains the whole buffer as one batch; a failed write puts
//! the batch back at the front of the buffer so nothing is lost and order
//! is preserved.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::AuditSettings;
use crate::domain::{AuditError, AuditEventType, AuditQuery, AuditRecord, AuditStore};
use crate::infrastructure::observability;

/// Partition file name for a calendar day (UTC)
pub fn partition_name(date: NaiveDate) -> String {
    format!("audit-{}.jsonl", date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone)]
pub struct JournalSettings {
    /// When false, records are mirrored to the log stream only
    pub persist: bool,
    pub flush_interval: Duration,
    pub max_buffer_size: usize,
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self {
            persist: true,
            flush_interval: Duration::from_secs(5),
            max_buffer_size: 100,
        }
    }
}

impl From<&AuditSettings> for JournalSettings {
    fn from(settings: &AuditSettings) -> Self {
        Self {
            persist: settings.enabled,
            flush_interval: settings.flush_interval(),
            max_buffer_size: settings.max_buffer_size.max(1),
        }
    }
}

#[derive(Debug)]
pub struct AuditJournal {
    store: Arc<dyn AuditStore>,
    buffer: Mutex<VecDeque<AuditRecord>>,
    /// Active partition date; also serializes flushes so batches land in order
    active: tokio::sync::Mutex<NaiveDate>,
    settings: JournalSettings,
    flush_requested: Notify,
}

impl AuditJournal {
    pub fn new(store: Arc<dyn AuditStore>, settings: JournalSettings) -> Self {
        Self {
            store,
            buffer: Mutex::new(VecDeque::new()),
            active: tokio::sync::Mutex::new(Utc::now().date_naive()),
            settings,
            flush_requested: Notify::new(),
        }
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<AuditRecord>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer a record and mirror it to the `audit` log target
    pub fn record(&self, record: AuditRecord) {
        info!(
            target: "audit",
            event_type = %record.event_type,
            identity_id = record.identity_id.as_deref().unwrap_or(""),
            api_key_id = record.api_key_id.as_deref().unwrap_or(""),
            operation = record.operation.as_deref().unwrap_or(""),
            "Audit event"
        );

        if !self.settings.persist {
            return;
        }

        let pending = {
            let mut buffer = self.lock_buffer();
            buffer.push_back(record);
            buffer.len()
        };

        if pending >= self.settings.max_buffer_size {
            self.flush_requested.notify_one();
        }
    }

    /// Records waiting for the next flush
    pub fn pending(&self) -> usize {
        self.lock_buffer().len()
    }

    pub async fn active_partition(&self) -> String {
        partition_name(*self.active.lock().await)
    }

    /// Write every buffered record to the active partition in one append
    pub async fn flush(&self) -> Result<usize, AuditError> {
        let active = self.active.lock().await;
        self.flush_into(*active).await
    }

    /// Caller must hold the `active` lock
    async fn flush_into(&self, date: NaiveDate) -> Result<usize, AuditError> {
        let batch: Vec<AuditRecord> = self.lock_buffer().drain(..).collect();
        if batch.is_empty() {
            return Ok(0);
        }

        let partition = partition_name(date);
        let written = match encode_batch(&batch) {
            Ok(payload) => self.store.append(&partition, &payload).await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => {
                debug!(event_count = batch.len(), partition = %partition, "Audit log flushed");
                observability::record_audit_flush(batch.len(), true);
                Ok(batch.len())
            }
            Err(e) => {
                error!(
                    error = %e,
                    event_count = batch.len(),
                    partition = %partition,
                    "Failed to flush audit log, re-buffering"
                );
                observability::record_audit_flush(batch.len(), false);
                self.requeue(batch);
                Err(e)
            }
        }
    }

    fn requeue(&self, batch: Vec<AuditRecord>) {
        let mut buffer = self.lock_buffer();
        for record in batch.into_iter().rev() {
            buffer.push_front(record);
        }
    }

    /// Switch to the partition for `date`, flushing the old one first
    ///
    /// If that flush fails the records stay buffered and are written to the
    /// new partition by the next successful flush.
    pub async fn rotate_to(&self, date: NaiveDate) -> Result<bool, AuditError> {
        let mut active = self.active.lock().await;
        if *active == date {
            return Ok(false);
        }

        let flushed = self.flush_into(*active).await;
        let previous = std::mem::replace(&mut *active, date);

        info!(
            previous = %partition_name(previous),
            current = %partition_name(date),
            "Audit log file rotated"
        );

        flushed.map(|_| true)
    }

    pub async fn rotate_if_needed(&self) -> Result<bool, AuditError> {
        self.rotate_to(Utc::now().date_naive()).await
    }

    /// Flush, then read the active partition newest-first
    ///
    /// Lines that fail to parse are skipped.
    pub async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError> {
        let date = {
            let active = self.active.lock().await;
            if let Err(e) = self.flush_into(*active).await {
                warn!(error = %e, "Querying without pending audit records");
            }
            *active
        };

        let content = self.store.read(&partition_name(date)).await?;

        let mut records: Vec<AuditRecord> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<AuditRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(error = %e, "Skipping malformed audit line");
                    None
                }
            })
            .filter(|record| query.matches(record))
            .collect();

        // Later appends first when timestamps tie
        records.reverse();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(query.limit);

        Ok(records)
    }

    /// Count records per event type since `since`
    pub async fn stats(
        &self,
        since: DateTime<Utc>,
    ) -> Result<BTreeMap<AuditEventType, usize>, AuditError> {
        let records = self
            .query(&AuditQuery::new().since(since).limit(usize::MAX))
            .await?;

        let mut counts = BTreeMap::new();
        for record in records {
            *counts.entry(record.event_type).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Spawn the flush loop: every interval, or as soon as the buffer fills.
    /// Each pass also rotates the partition when the date has changed.
    pub fn spawn_flusher(self: &Arc<Self>) -> JoinHandle<()> {
        let journal = Arc::clone(self);

        tokio::spawn(async move {
            let period = journal.settings.flush_interval.max(Duration::from_millis(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = journal.flush_requested.notified() => {}
                }

                if let Err(e) = journal.rotate_if_needed().await {
                    warn!(error = %e, "Audit rotation flush failed");
                }
                // Failures are logged and re-buffered inside flush
                let _ = journal.flush().await;
            }
        })
    }
}

fn encode_batch(batch: &[AuditRecord]) -> Result<String, AuditError> {
    let mut payload = String::new();
    for record in batch {
        payload.push_str(&serde_json::to_string(record)?);
        payload.push('\n');
    }
    Ok(payload)
}
