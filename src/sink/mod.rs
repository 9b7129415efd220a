//! Consumers of distributed metrics and the workers feeding them.
//!
//! The plugin queue drains into the plugin runtime. The internal queue fans
//! out, in registration order, to every `Receiver`: the cloud cache, the
//! console and whatever the embedding process registers.

use metric::Metric;
use std::error;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use util;

mod cloud;
mod console;
mod distribute;

pub use self::cloud::{BucketKey, CloudCache, Entry};
pub use self::console::Console;
pub use self::distribute::{deliver_internal, deliver_plugins, run_internal, run_plugins};

/// A failed delivery of one metric to one consumer.
#[derive(Debug)]
pub enum DeliveryError {
    /// The consumer refused or could not handle the metric.
    Rejected(String),
    /// The consumer panicked while handling the metric.
    Panicked(String),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DeliveryError::Rejected(ref reason) => write!(f, "delivery rejected: {}", reason),
            DeliveryError::Panicked(ref reason) => write!(f, "consumer panicked: {}", reason),
        }
    }
}

impl error::Error for DeliveryError {
    fn description(&self) -> &str {
        match *self {
            DeliveryError::Rejected(_) => "delivery rejected",
            DeliveryError::Panicked(_) => "consumer panicked",
        }
    }
}

/// An internal consumer of distributed metrics.
///
/// Receivers are called one after the other from the internal distribution
/// worker, never concurrently with each other.
pub trait Receiver: Send {
    /// Handle one metric. The metric is borrowed; a receiver wishing to keep
    /// it must clone.
    fn receive(&mut self, metric: &Metric) -> Result<(), DeliveryError>;
}

impl<F> Receiver for F
where
    F: FnMut(&Metric) -> Result<(), DeliveryError> + Send,
{
    fn receive(&mut self, metric: &Metric) -> Result<(), DeliveryError> {
        self(metric)
    }
}

/// The ordered list of registered receivers.
///
/// Registration never waits on a delivery in progress: new receivers are
/// parked and join the list at the start of the next delivery. A receiver may
/// therefore register further receivers from within `receive`.
#[derive(Default)]
pub struct Receivers {
    inner: Mutex<Vec<Box<dyn Receiver>>>,
    pending: Mutex<Vec<Box<dyn Receiver>>>,
    count: AtomicUsize,
}

impl fmt::Debug for Receivers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Receivers {{ len: {} }}", self.len())
    }
}

impl Receivers {
    /// Create an empty receiver list.
    pub fn new() -> Receivers {
        Receivers::default()
    }

    /// Append `receiver` after every previously registered one.
    pub fn add<R>(&self, receiver: R)
    where
        R: Receiver + 'static,
    {
        util::lock(&self.pending).push(Box::new(receiver));
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of registered receivers.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// True if no receiver is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<Vec<Box<dyn Receiver>>> {
        let mut receivers = util::lock(&self.inner);
        receivers.extend(util::lock(&self.pending).drain(..));
        receivers
    }
}
