use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::SecurityConfig;

use super::service::Gateway;

/// Periods for the independent housekeeping timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepIntervals {
    pub auth_cache: Duration,
    pub rate_windows: Duration,
    pub quotas: Duration,
}

impl Default for SweepIntervals {
    fn default() -> Self {
        Self {
            auth_cache: Duration::from_secs(60),
            rate_windows: Duration::from_secs(60),
            quotas: Duration::from_secs(300),
        }
    }
}

impl From<&SecurityConfig> for SweepIntervals {
    fn from(config: &SecurityConfig) -> Self {
        Self {
            auth_cache: Duration::from_secs(config.auth.cache_sweep_interval_secs),
            rate_windows: Duration::from_secs(config.rate_limit.sweep_interval_secs),
            quotas: Duration::from_secs(config.resources.sweep_interval_secs),
        }
    }
}

/// Handles to the running sweepers and the audit flusher; dropping aborts them
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn abort(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.abort();
    }
}

impl Gateway {
    /// Start cache eviction, window cleanup, idle-quota cleanup and the audit
    /// flush/rotation loop on their own timers
    pub fn start_background_tasks(&self, intervals: SweepIntervals) -> BackgroundTasks {
        let handles = vec![
            self.validator().spawn_sweeper(intervals.auth_cache),
            self.rate_limiter().spawn_sweeper(intervals.rate_windows),
            self.quotas().spawn_sweeper(intervals.quotas),
            self.journal().spawn_flusher(),
        ];

        info!(tasks = handles.len(), "Gateway background tasks started");

        BackgroundTasks { handles }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervals_follow_config() {
        let mut config = SecurityConfig::default();
        config.auth.cache_sweep_interval_secs = 5;
        config.resources.sweep_interval_secs = 7;

        let intervals = SweepIntervals::from(&config);

        assert_eq!(intervals.auth_cache, Duration::from_secs(5));
        assert_eq!(intervals.rate_windows, Duration::from_secs(60));
        assert_eq!(intervals.quotas, Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_abort_stops_every_task() {
        let mut tasks = BackgroundTasks {
            handles: vec![tokio::spawn(std::future::pending::<()>())],
        };
        assert_eq!(tasks.len(), 1);

        tasks.abort();

        assert!(tasks.is_empty());
    }
}
