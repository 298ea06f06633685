//! In-memory audit store

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::{AuditError, AuditStore};

/// Audit store that keeps partitions in memory
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    partitions: RwLock<BTreeMap<String, String>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, partition: &str, payload: &str) -> Result<(), AuditError> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|e| AuditError::store(format!("Failed to acquire write lock: {}", e)))?;

        partitions
            .entry(partition.to_string())
            .or_default()
            .push_str(payload);

        Ok(())
    }

    async fn read(&self, partition: &str) -> Result<String, AuditError> {
        let partitions = self
            .partitions
            .read()
            .map_err(|e| AuditError::store(format!("Failed to acquire read lock: {}", e)))?;

        Ok(partitions.get(partition).cloned().unwrap_or_default())
    }

    async fn partitions(&self) -> Result<Vec<String>, AuditError> {
        let partitions = self
            .partitions
            .read()
            .map_err(|e| AuditError::store(format!("Failed to acquire read lock: {}", e)))?;

        Ok(partitions.keys().cloned().collect())
    }
}
