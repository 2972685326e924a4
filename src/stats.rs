use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::status::Status;

/// Thread-safe production counters, keyed by status name, workflow
/// signature and bank name.
///
/// Every worker and the bank mutator increment these concurrently; all
/// mutation goes through one internal lock, so increments are never lost.
/// Critical sections are a single map update and nothing ever awaits while
/// holding the lock.
#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    statuses: HashMap<String, u64>,
    workflows: HashMap<String, u64>,
    banks: HashMap<String, u64>,
}

/// A point-in-time copy of all three counter maps.
///
/// The copy is taken under a single lock acquisition, but holds no claim of
/// atomicity relative to activity after the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub statuses: HashMap<String, u64>,
    pub workflows: HashMap<String, u64>,
    pub banks: HashMap<String, u64>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new aggregator with every known status pre-seeded to zero, so
    /// statuses which are never produced still report as zero.
    pub fn with_all_statuses() -> Self {
        let stats = Self::new();
        for status in Status::ALL {
            stats.init_status(status.name());
        }
        stats
    }

    /// Registers a status key with a zero count.
    pub fn init_status(&self, name: &str) {
        let mut inner = self.lock();
        inner.statuses.entry(name.to_string()).or_insert(0);
    }

    /// Adds one to the status counter, creating the key at 1 if unseen.
    pub fn inc_status(&self, name: &str) {
        let mut inner = self.lock();
        *inner.statuses.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Adds one to the workflow counter, creating the key at 1 if unseen.
    pub fn inc_workflow(&self, signature: &str) {
        let mut inner = self.lock();
        *inner.workflows.entry(signature.to_string()).or_insert(0) += 1;
    }

    /// Adds one to the bank-update counter, creating the key at 1 if unseen.
    pub fn inc_bank(&self, name: &str) {
        let mut inner = self.lock();
        *inner.banks.entry(name.to_string()).or_insert(0) += 1;
    }

    /// A point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.lock();
        StatsSnapshot {
            statuses: inner.statuses.clone(),
            workflows: inner.workflows.clone(),
            banks: inner.banks.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.inner
            .lock()
            .expect("should not panic while holding lock")
    }
}

impl StatsSnapshot {
    pub fn status_total(&self) -> u64 {
        self.statuses.values().sum()
    }

    pub fn workflow_total(&self) -> u64 {
        self.workflows.values().sum()
    }

    pub fn bank_total(&self) -> u64 {
        self.banks.values().sum()
    }
}
