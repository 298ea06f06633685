//! Infrastructure layer - gate implementations and their backends

pub mod audit;
pub mod auth;
pub mod authorizer;
pub mod gateway;
pub mod logging;
pub mod observability;
pub mod quota;
pub mod rate_limiter;

pub use authorizer::Authorizer;
pub use gateway::{BackgroundTasks, Gateway, GatewaySettings, GuardedRequest, SweepIntervals};
pub use quota::{QuotaStats, QuotaTracker, Reservation};
pub use rate_limiter::{RateLimitResult, RateLimiter, RateLimiterStats};
