//! Per-identity resource quotas
//!
//! The gateway reserves a slot when it admits a quota-bound operation and
//! commits it to the held count when the operation succeeds. Reserved slots
//! count against the ceiling, so concurrent admissions can never overshoot.
//! Nothing decrements held counts automatically: whoever tears down the real
//! resource must call [`QuotaTracker::release`], or the slot leaks until an
//! operator runs [`QuotaTracker::reset`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::ResourceClass;

#[derive(Debug, Clone)]
struct ResourceUsage {
    counts: BTreeMap<ResourceClass, u32>,
    /// Slots admitted but not yet committed or abandoned
    reserved: BTreeMap<ResourceClass, u32>,
    last_activity: Instant,
}

impl ResourceUsage {
    fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
            reserved: BTreeMap::new(),
            last_activity: Instant::now(),
        }
    }

    fn held(&self, class: &ResourceClass) -> u32 {
        self.counts.get(class).copied().unwrap_or(0)
    }

    fn reserved(&self, class: &ResourceClass) -> u32 {
        self.reserved.get(class).copied().unwrap_or(0)
    }

    /// Held plus reserved
    fn committed_or_pending(&self, class: &ResourceClass) -> u32 {
        self.held(class).saturating_add(self.reserved(class))
    }

    fn is_idle(&self) -> bool {
        self.counts
            .values()
            .chain(self.reserved.values())
            .all(|count| *count == 0)
    }
}

/// One slot admitted against a ceiling
///
/// [`Reservation::commit`] turns it into a held unit. Dropping it uncommitted
/// gives the slot back.
#[derive(Debug)]
pub struct Reservation {
    tracker: Arc<QuotaTracker>,
    identity: String,
    class: ResourceClass,
    settled: bool,
}

impl Reservation {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn class(&self) -> &ResourceClass {
        &self.class
    }

    /// Convert the slot into a held unit; returns the new held count
    pub fn commit(mut self) -> u32 {
        self.settled = true;
        self.tracker.settle(&self.identity, &self.class, true)
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.settle(&self.identity, &self.class, false);
        }
    }
}

/// Aggregate usage across all identities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaStats {
    pub identities: usize,
    pub totals: BTreeMap<ResourceClass, u64>,
}

/// Live bounded-resource counts per identity
#[derive(Debug)]
pub struct QuotaTracker {
    usage: RwLock<HashMap<String, ResourceUsage>>,
    ceilings: HashMap<ResourceClass, u32>,
    idle_threshold: Duration,
}

impl QuotaTracker {
    pub fn new(ceilings: HashMap<ResourceClass, u32>) -> Self {
        Self {
            usage: RwLock::new(HashMap::new()),
            ceilings,
            idle_threshold: Duration::from_secs(3600),
        }
    }

    pub fn with_idle_threshold(mut self, idle_threshold: Duration) -> Self {
        self.idle_threshold = idle_threshold;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ResourceUsage>> {
        self.usage.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ResourceUsage>> {
        self.usage.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configured maximum for a class; `None` means unbounded
    pub fn ceiling(&self, class: &ResourceClass) -> Option<u32> {
        self.ceilings.get(class).copied()
    }

    /// Held count for one identity and class
    pub fn held(&self, identity: &str, class: &ResourceClass) -> u32 {
        self.read()
            .get(identity)
            .map(|usage| usage.held(class))
            .unwrap_or(0)
    }

    /// Slots reserved by in-flight operations
    pub fn reserved(&self, identity: &str, class: &ResourceClass) -> u32 {
        self.read()
            .get(identity)
            .map(|usage| usage.reserved(class))
            .unwrap_or(0)
    }

    /// Whether one more unit fits under the ceiling; never mutates state
    ///
    /// Advisory only: the answer may be stale by the time the caller acts on
    /// it. Use [`QuotaTracker::try_reserve`] to claim a slot.
    pub fn can_acquire(&self, identity: &str, class: &ResourceClass) -> bool {
        let Some(ceiling) = self.ceiling(class) else {
            return true;
        };

        let held = self
            .read()
            .get(identity)
            .map(|usage| usage.committed_or_pending(class))
            .unwrap_or(0);
        if held >= ceiling {
            warn!(
                identity,
                resource_class = %class,
                current = held,
                max = ceiling,
                "Resource quota exceeded"
            );
            return false;
        }

        true
    }

    /// Check the ceiling and claim a slot in one step
    ///
    /// Fails with the ceiling when held plus reserved slots already reach it.
    pub fn try_reserve(
        self: &Arc<Self>,
        identity: &str,
        class: &ResourceClass,
    ) -> Result<Reservation, u32> {
        let mut usage = self.write();
        let entry = usage
            .entry(identity.to_string())
            .or_insert_with(ResourceUsage::new);

        if let Some(ceiling) = self.ceiling(class) {
            let current = entry.committed_or_pending(class);
            if current >= ceiling {
                warn!(
                    identity,
                    resource_class = %class,
                    current,
                    max = ceiling,
                    "Resource quota exceeded"
                );
                return Err(ceiling);
            }
        }

        let reserved = entry.reserved.entry(class.clone()).or_insert(0);
        *reserved = reserved.saturating_add(1);
        entry.last_activity = Instant::now();

        Ok(Reservation {
            tracker: Arc::clone(self),
            identity: identity.to_string(),
            class: class.clone(),
            settled: false,
        })
    }

    /// Drop one reserved slot, moving it to held when `commit` is set
    fn settle(&self, identity: &str, class: &ResourceClass, commit: bool) -> u32 {
        let mut usage = self.write();
        let entry = usage
            .entry(identity.to_string())
            .or_insert_with(ResourceUsage::new);

        if let Some(reserved) = entry.reserved.get_mut(class) {
            *reserved = reserved.saturating_sub(1);
        }
        entry.last_activity = Instant::now();

        if !commit {
            debug!(identity, resource_class = %class, "Resource reservation abandoned");
            return entry.held(class);
        }

        let count = entry.counts.entry(class.clone()).or_insert(0);
        *count = count.saturating_add(1);
        debug!(identity, resource_class = %class, held = *count, "Resource acquired");
        *count
    }

    /// Charge one unit outside the reservation path; returns the new held count
    pub fn acquire(&self, identity: &str, class: &ResourceClass) -> u32 {
        let mut usage = self.write();
        let entry = usage
            .entry(identity.to_string())
            .or_insert_with(ResourceUsage::new);

        let count = entry.counts.entry(class.clone()).or_insert(0);
        *count = count.saturating_add(1);
        entry.last_activity = Instant::now();

        debug!(identity, resource_class = %class, held = *count, "Resource acquired");
        *count
    }

    /// Return one unit, floored at zero; returns the new held count
    pub fn release(&self, identity: &str, class: &ResourceClass) -> u32 {
        let mut usage = self.write();
        let Some(entry) = usage.get_mut(identity) else {
            return 0;
        };

        entry.last_activity = Instant::now();
        match entry.counts.get_mut(class) {
            Some(count) => {
                *count = count.saturating_sub(1);
                debug!(identity, resource_class = %class, held = *count, "Resource released");
                *count
            }
            None => 0,
        }
    }

    /// Held counts for one identity
    pub fn usage(&self, identity: &str) -> BTreeMap<ResourceClass, u32> {
        self.read()
            .get(identity)
            .map(|usage| usage.counts.clone())
            .unwrap_or_default()
    }

    /// Held counts for every tracked identity
    pub fn all_usage(&self) -> BTreeMap<String, BTreeMap<ResourceClass, u32>> {
        self.read()
            .iter()
            .map(|(identity, usage)| (identity.clone(), usage.counts.clone()))
            .collect()
    }

    /// Zero every count held by an identity; in-flight reservations are kept
    pub fn reset(&self, identity: &str) {
        if let Some(entry) = self.write().get_mut(identity) {
            entry.counts.values_mut().for_each(|count| *count = 0);
            entry.last_activity = Instant::now();
            info!(identity, "Resource usage reset");
        }
    }

    /// Drop identities holding nothing that have been idle past the threshold
    pub fn sweep(&self) -> usize {
        let mut usage = self.write();
        let before = usage.len();

        usage.retain(|_, entry| {
            !(entry.is_idle() && entry.last_activity.elapsed() > self.idle_threshold)
        });

        let removed = before - usage.len();
        if removed > 0 {
            debug!(count = removed, "Cleaned inactive quota entries");
        }
        removed
    }

    /// Spawn a task that runs [`QuotaTracker::sweep`] every `every`
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let tracker = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                tracker.sweep();
            }
        })
    }

    pub fn stats(&self) -> QuotaStats {
        let usage = self.read();
        let mut totals = BTreeMap::new();

        for entry in usage.values() {
            for (class, count) in &entry.counts {
                *totals.entry(class.clone()).or_insert(0u64) += u64::from(*count);
            }
        }

        QuotaStats {
            identities: usage.len(),
            totals,
        }
    }
}
