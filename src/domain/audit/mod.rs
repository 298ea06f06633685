//! Audit domain
//!
//! Immutable records of security-relevant events, the query model used to
//! read them back, and the storage contract for date partitions.

mod error;
mod event;
mod query;
mod store;

pub use error::AuditError;
pub use event::{AuditEventType, AuditRecord};
pub use query::AuditQuery;
pub use store::AuditStore;
