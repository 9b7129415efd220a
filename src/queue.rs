//! Unbounded FIFO queues between ingestion and distribution.
//!
//! Ingestion pushes at the tail, distribution pops from the head. Neither side
//! ever blocks waiting on the other: an empty queue simply answers `None` and
//! the consumer decides how long to wait before asking again.

use metric::Metric;
use std::collections::VecDeque;
use std::sync::Mutex;
use util;

/// A thread-safe unbounded FIFO.
#[derive(Debug)]
pub struct Queue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> Default for Queue<T> {
    fn default() -> Queue<T> {
        Queue {
            inner: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> Queue<T> {
    /// Create an empty queue.
    pub fn new() -> Queue<T> {
        Queue::default()
    }

    /// Append `item` at the tail.
    pub fn push(&self, item: T) {
        util::lock(&self.inner).push_back(item);
    }

    /// Remove the item at the head, if any.
    pub fn pop(&self) -> Option<T> {
        util::lock(&self.inner).pop_front()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        util::lock(&self.inner).len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The two queues every accepted metric is copied onto.
#[derive(Debug, Default)]
pub struct DualQueue {
    /// Feeds the plugin runtime's subscribers.
    pub plugins: Queue<Metric>,
    /// Feeds the internally registered receivers.
    pub internal: Queue<Metric>,
}

impl DualQueue {
    /// Create a pair of empty queues.
    pub fn new() -> DualQueue {
        DualQueue::default()
    }

    /// Push an independently owned copy of `metric` onto each queue.
    pub fn push(&self, metric: Metric) {
        self.plugins.push(metric.clone());
        self.internal.push(metric);
    }
}
