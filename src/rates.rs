//! Cumulative throughput counters.
//!
//! Counters are keyed by rate key (see `metric::rate_key`) and only ever
//! grow. Alongside every key lives the reserved `total` key which is kept
//! equal to the sum of all others. Both are updated under the same lock so no
//! reader can observe one without the other.

use constants::TOTAL;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use util;

/// A point-in-time copy of a `RateTracker`.
pub type Snapshot = BTreeMap<String, u64>;

/// Concurrent cumulative counters with a running total.
#[derive(Debug)]
pub struct RateTracker {
    counters: Mutex<Snapshot>,
}

impl Default for RateTracker {
    fn default() -> RateTracker {
        let mut counters = Snapshot::new();
        counters.insert(TOTAL.to_string(), 0);
        RateTracker {
            counters: Mutex::new(counters),
        }
    }
}

impl RateTracker {
    /// Create a tracker holding only a zeroed `total`.
    pub fn new() -> RateTracker {
        RateTracker::default()
    }

    /// Add `count` to `key` and to `total`.
    ///
    /// A zero count is ignored so that keys only appear once something was
    /// actually counted for them.
    pub fn increment(&self, key: &str, count: u64) {
        if count == 0 {
            return;
        }
        let mut counters = util::lock(&self.counters);
        *counters.entry(key.to_string()).or_insert(0) += count;
        *counters.entry(TOTAL.to_string()).or_insert(0) += count;
    }

    /// A consistent copy of every counter, `total` included.
    pub fn snapshot(&self) -> Snapshot {
        util::lock(&self.counters).clone()
    }

    /// The current value of `key`, zero if it was never counted.
    pub fn get(&self, key: &str) -> u64 {
        util::lock(&self.counters).get(key).cloned().unwrap_or(0)
    }

    /// The current value of `total`.
    pub fn total(&self) -> u64 {
        self.get(TOTAL)
    }
}

/// The inbound and outbound trackers of a pipeline.
#[derive(Debug, Default)]
pub struct Rates {
    /// Metrics accepted at ingestion.
    pub inbound: RateTracker,
    /// Metric deliveries made by distribution.
    pub outbound: RateTracker,
}

impl Rates {
    /// Create a fresh pair of trackers.
    pub fn new() -> Rates {
        Rates::default()
    }

    /// Count one accepted metric for `key`.
    pub fn record_inbound(&self, key: &str) {
        self.inbound.increment(key, 1);
    }

    /// Count `count` deliveries for `key`.
    pub fn record_outbound(&self, key: &str, count: u64) {
        self.outbound.increment(key, count);
    }

    /// Consistent snapshots of both trackers, inbound first.
    pub fn snapshot(&self) -> (Snapshot, Snapshot) {
        (self.inbound.snapshot(), self.outbound.snapshot())
    }

    /// Every key known to either tracker.
    pub fn keys(&self) -> BTreeSet<String> {
        let (inbound, outbound) = self.snapshot();
        inbound.into_iter().chain(outbound).map(|(k, _)| k).collect()
    }
}
