//! Audit storage trait

use async_trait::async_trait;

use super::AuditError;

/// Durable, append-only storage of line-delimited audit partitions
#[async_trait]
pub trait AuditStore: Send + Sync + std::fmt::Debug {
    /// Append `payload` to `partition` in a single durable write
    async fn append(&self, partition: &str, payload: &str) -> Result<(), AuditError>;

    /// Full contents of a partition; empty when it does not exist yet
    async fn read(&self, partition: &str) -> Result<String, AuditError>;

    /// Partitions present in the store, sorted by name
    async fn partitions(&self) -> Result<Vec<String>, AuditError>;
}
