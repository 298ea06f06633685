//! Audit journal and its storage backends

mod file_store;
mod in_memory;
mod journal;

pub use file_store::FileAuditStore;
pub use in_memory::InMemoryAuditStore;
pub use journal::{AuditJournal, JournalSettings, partition_name};
