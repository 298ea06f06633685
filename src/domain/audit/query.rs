use chrono::{DateTime, Utc};

use super::{AuditEventType, AuditRecord};

/// Filter over one audit partition
#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub event_type: Option<AuditEventType>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            event_type: None,
            start: None,
            end: None,
            limit: 100,
        }
    }
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_type(mut self, event_type: AuditEventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Bounds are inclusive on both ends
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(event_type) = self.event_type {
            if record.event_type != event_type {
                return false;
            }
        }

        if let Some(start) = self.start {
            if record.timestamp < start {
                return false;
            }
        }

        if let Some(end) = self.end {
            if record.timestamp > end {
                return false;
            }
        }

        true
    }
}
