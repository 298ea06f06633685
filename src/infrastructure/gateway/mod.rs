//! Security gateway
//!
//! Runs every guarded invocation through authentication, authorization,
//! rate limiting and quota checks before the operation executes, and writes
//! exactly one audit record per request.

mod denial;
mod factory;
mod request;
mod service;
mod tasks;

pub use factory::{assemble, build_gateway};
pub use request::GuardedRequest;
pub use service::{Gateway, GatewaySettings};
pub use tasks::{BackgroundTasks, SweepIntervals};
