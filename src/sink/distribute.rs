//! The distribution workers.
//!
//! Each worker drains one queue. An empty queue is the steady state: the
//! worker sleeps for the idle delay and looks again, which also keeps it
//! responsive to a stop request. A metric already taken off the queue is
//! always delivered in full before the stop flag is consulted again.

use metric::Metric;
use pipeline::Context;
use sink::DeliveryError;
use source::PluginRuntime;
use std::thread;
use util;

/// Deliver `metric` to the plugin runtime and count the subscribers reached
/// outbound. Returns that count; a failed delivery reaches nobody.
pub fn deliver_plugins<R>(ctx: &Context, runtime: &R, metric: &Metric) -> usize
where
    R: PluginRuntime + ?Sized,
{
    let delivered = match util::guarded(|| runtime.distribute(metric)) {
        Ok(Ok(count)) => count,
        Ok(Err(e)) => {
            error!("could not distribute {:?} to plugins: {}", metric.rate_key(), e);
            0
        }
        Err(panic) => {
            error!(
                "could not distribute {:?} to plugins: {}",
                metric.rate_key(),
                DeliveryError::Panicked(panic)
            );
            0
        }
    };
    ctx.rates
        .record_outbound(&metric.rate_key(), delivered as u64);
    delivered
}

/// Deliver `metric` to every registered receiver, in registration order, and
/// count each delivery outbound.
///
/// Every receiver is called inside its own guard. A receiver which errors or
/// panics is logged and skipped over, the remaining receivers are still
/// called and the delivery still counts. Returns the number of receivers
/// which accepted the metric.
pub fn deliver_internal(ctx: &Context, metric: &Metric) -> usize {
    let key = metric.rate_key();
    let mut accepted = 0;
    let mut receivers = ctx.receivers.lock();
    for (idx, receiver) in receivers.iter_mut().enumerate() {
        let res = match util::guarded(|| receiver.receive(metric)) {
            Ok(res) => res,
            Err(panic) => Err(DeliveryError::Panicked(panic)),
        };
        match res {
            Ok(()) => accepted += 1,
            Err(e) => error!("receiver {} failed on {:?}: {}", idx, key, e),
        }
        ctx.rates.record_outbound(&key, 1);
    }
    accepted
}

/// The plugin distribution loop.
pub fn run_plugins<R>(ctx: &Context, runtime: &R)
where
    R: PluginRuntime + ?Sized,
{
    info!("plugin distribution started");
    while !ctx.stopped() {
        match ctx.queues.plugins.pop() {
            Some(metric) => {
                let reached = deliver_plugins(ctx, runtime, &metric);
                trace!("delivered {:?} to {} plugins", metric.rate_key(), reached);
            }
            None => thread::sleep(ctx.cadence.idle),
        }
    }
    info!("plugin distribution stopped");
}

/// The internal distribution loop.
pub fn run_internal(ctx: &Context) {
    info!("internal distribution started");
    while !ctx.stopped() {
        match ctx.queues.internal.pop() {
            Some(metric) => {
                deliver_internal(ctx, &metric);
            }
            None => thread::sleep(ctx.cadence.idle),
        }
    }
    info!("internal distribution stopped");
}
