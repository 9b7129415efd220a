//! Windowed, de-duplicating cache of metrics awaiting upload.
//!
//! Metrics are grouped into fixed-width time windows and, within a window, by
//! source, type and name. Inside such a bucket a metric's definition decides
//! identity: two metrics whose identity tags all agree are the same series and
//! the later one replaces the earlier. Windows older than the retention
//! horizon are dropped the next time something is inserted. Nothing here
//! survives a restart.

use metric::{Definition, Definitions, Metric};
use sink::{DeliveryError, Receiver};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use time;
use util;

/// Identifies a bucket of the cache.
///
/// Ordering is by window first so that stale buckets sort to the front.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    /// Start of the window, in seconds since the epoch.
    pub window_start: i64,
    /// Metric source.
    pub source: String,
    /// Metric type.
    pub metric_type: String,
    /// Metric name.
    pub name: String,
}

/// A cached metric with the definition that identified it.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    /// The most recent metric of its series within the window.
    pub metric: Metric,
    /// The definition resolved for the metric.
    pub definition: Definition,
}

type Buckets = BTreeMap<BucketKey, Vec<Entry>>;

/// Start of the window of width `window` holding `timestamp`.
pub fn window_start(timestamp: f64, window: i64) -> i64 {
    let ts = timestamp.floor() as i64;
    ts.saturating_sub(ts.rem_euclid(window))
}

/// The cloud cache. Clones share the same buckets, so one handle can be
/// registered as a receiver while another is held by the uploader.
#[derive(Clone, Debug)]
pub struct CloudCache {
    window: i64,
    retention: i64,
    definitions: Arc<Definitions>,
    buckets: Arc<Mutex<Buckets>>,
}

impl CloudCache {
    /// Create an empty cache.
    ///
    /// `window` and `retention` are in seconds. A zero window is treated as
    /// one second wide.
    pub fn new(window: u64, retention: u64, definitions: Arc<Definitions>) -> CloudCache {
        CloudCache {
            window: window.max(1) as i64,
            retention: retention as i64,
            definitions: definitions,
            buckets: Arc::new(Mutex::new(Buckets::new())),
        }
    }

    /// Width of a window, in seconds.
    pub fn window(&self) -> i64 {
        self.window
    }

    /// Insert `metric` as though the current time were `now`.
    ///
    /// Returns false, leaving the cache untouched, if the metric has no name
    /// or no definition. Otherwise the metric replaces the entry of its series
    /// in its bucket, or is appended, and every bucket whose window started
    /// before `now - retention` is evicted.
    pub fn insert_at(&self, metric: &Metric, now: f64) -> bool {
        let name = match metric.name {
            Some(ref name) => name,
            None => return false,
        };
        let definition = match self.definitions.get(&metric.source, &metric.metric_type, name) {
            Some(def) => def,
            None => return false,
        };
        let key = BucketKey {
            window_start: window_start(metric.timestamp, self.window),
            source: metric.source.clone(),
            metric_type: metric.metric_type.clone(),
            name: name.clone(),
        };

        let mut buckets = util::lock(&self.buckets);
        {
            let entries = buckets.entry(key).or_insert_with(Vec::new);
            let existing = entries.iter().position(|candidate| {
                definition
                    .tags
                    .iter()
                    .all(|tag| candidate.metric.identity(tag) == metric.identity(tag))
            });
            let entry = Entry {
                metric: metric.clone(),
                definition: definition.clone(),
            };
            match existing {
                Some(idx) => entries[idx] = entry,
                None => entries.push(entry),
            }
        }

        let horizon = now - self.retention as f64;
        let stale: Vec<BucketKey> = buckets
            .keys()
            .take_while(|key| (key.window_start as f64) < horizon)
            .cloned()
            .collect();
        for key in stale {
            trace!("evicting cloud cache bucket {:?}", key);
            buckets.remove(&key);
        }
        true
    }

    /// Number of buckets currently held.
    pub fn len(&self) -> usize {
        util::lock(&self.buckets).len()
    }

    /// True if no bucket is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The entries of one bucket, in insertion order.
    pub fn entries(&self, key: &BucketKey) -> Vec<Entry> {
        util::lock(&self.buckets)
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// A copy of every bucket, oldest window first.
    pub fn snapshot(&self) -> Vec<(BucketKey, Vec<Entry>)> {
        util::lock(&self.buckets)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Remove and return every bucket whose window closed at or before
    /// `horizon`, oldest first. Open windows stay put.
    pub fn drain_before(&self, horizon: f64) -> Vec<(BucketKey, Vec<Entry>)> {
        let window = self.window;
        let mut buckets = util::lock(&self.buckets);
        let closed: Vec<BucketKey> = buckets
            .keys()
            .take_while(|key| (key.window_start.saturating_add(window) as f64) <= horizon)
            .cloned()
            .collect();
        closed
            .into_iter()
            .filter_map(|key| buckets.remove(&key).map(|entries| (key, entries)))
            .collect()
    }
}

impl Receiver for CloudCache {
    fn receive(&mut self, metric: &Metric) -> Result<(), DeliveryError> {
        self.insert_at(metric, time::now());
        Ok(())
    }
}
