//! Mantis security gateway
//!
//! Gates every invocation of a sensitive tool behind:
//! - Credential validation against an external identity service, with a TTL cache
//! - Scope-based authorization from a per-operation policy table
//! - Fixed-window rate limiting per identity and operation
//! - Per-identity resource quotas
//! - A buffered, date-partitioned, queryable audit journal
//!
//! Collaborators call [`Gateway::execute_guarded`] with the operation name,
//! the caller's credential and the work to run. The work only runs when every
//! gate admits the request.

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{AppConfig, SecurityConfig};
pub use domain::{AuditEventType, AuditRecord, Credential, GatewayError, Identity, ResourceClass};
pub use infrastructure::gateway::{assemble, build_gateway};
pub use infrastructure::{BackgroundTasks, Gateway, GatewaySettings, GuardedRequest, SweepIntervals};
