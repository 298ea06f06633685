use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::domain::{AuditError, AuditStore};

/// Audit partitions as `.jsonl` files in one directory
#[derive(Debug, Clone)]
pub struct FileAuditStore {
    dir: PathBuf,
}

impl FileAuditStore {
    /// Open the store, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        info!(log_dir = %dir.display(), "Audit store initialized");

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, partition: &str) -> Result<PathBuf, AuditError> {
        if partition.contains(['/', '\\']) || partition.contains("..") {
            return Err(AuditError::store(format!(
                "invalid partition name: {}",
                partition
            )));
        }
        Ok(self.dir.join(partition))
    }
}

#[async_trait]
impl AuditStore for FileAuditStore {
    async fn append(&self, partition: &str, payload: &str) -> Result<(), AuditError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(partition)?)
            .await?;

        file.write_all(payload.as_bytes()).await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn read(&self, partition: &str) -> Result<String, AuditError> {
        match fs::read_to_string(self.path(partition)?).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn partitions(&self) -> Result<Vec<String>, AuditError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".jsonl") {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_is_cumulative() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuditStore::open(dir.path().join("audit")).await.unwrap();

        store.append("audit-2024-01-01.jsonl", "a\n").await.unwrap();
        store.append("audit-2024-01-01.jsonl", "b\n").await.unwrap();

        assert_eq!(store.read("audit-2024-01-01.jsonl").await.unwrap(), "a\nb\n");
    }

    #[tokio::test]
    async fn test_missing_partition_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuditStore::open(dir.path()).await.unwrap();

        assert_eq!(store.read("audit-1999-12-31.jsonl").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_partitions_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuditStore::open(dir.path()).await.unwrap();

        store.append("audit-2024-01-02.jsonl", "x\n").await.unwrap();
        store.append("audit-2024-01-01.jsonl", "x\n").await.unwrap();

        assert_eq!(
            store.partitions().await.unwrap(),
            vec!["audit-2024-01-01.jsonl", "audit-2024-01-02.jsonl"]
        );
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuditStore::open(dir.path()).await.unwrap();

        assert!(store.append("../escape.jsonl", "x\n").await.is_err());
    }
}
