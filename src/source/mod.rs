//! Producers of metrics and the ingestion workers polling them.
//!
//! A producer is pulled once per ingestion pass. Every record it returns is
//! validated; accepted records are counted inbound and copied onto both
//! queues, refused records are reported through the producer's own logger
//! and dropped.

use metric::{Metric, ValidationError};
use pipeline::Context;
use serde_json::Value;
use sink::DeliveryError;
use std::collections::HashMap;
use std::error;
use std::fmt;
use std::time::Instant;
use time;
use util;

pub mod internal;
mod null;

pub use self::null::{NullCollector, NullRuntime};

/// Diagnostic callback handed out by a producer for one source.
pub type Logger = Box<dyn Fn(&str) + Send>;

/// A failure of a collaborator to answer the pipeline.
#[derive(Debug)]
pub enum ProducerError {
    /// The collaborator reported a failure.
    Failed(String),
    /// The collaborator panicked.
    Panicked(String),
}

impl fmt::Display for ProducerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ProducerError::Failed(ref reason) => write!(f, "producer failed: {}", reason),
            ProducerError::Panicked(ref reason) => write!(f, "producer panicked: {}", reason),
        }
    }
}

impl error::Error for ProducerError {
    fn description(&self) -> &str {
        match *self {
            ProducerError::Failed(_) => "producer failed",
            ProducerError::Panicked(_) => "producer panicked",
        }
    }
}

/// Something the pipeline can pull metrics from.
pub trait Producer: Send + Sync {
    /// Return the metrics gathered since the last call. Expected to return
    /// promptly; a slow producer only stalls its own ingestion worker.
    fn collect(&self) -> Result<Vec<Value>, ProducerError>;

    /// The diagnostic logger for records claiming to come from `source`.
    fn logger(&self, source: &str) -> Logger {
        let source = source.to_string();
        Box::new(move |msg: &str| warn!("[{}] {}", source, msg))
    }
}

/// The plugin runtime: produces plugin metrics and distributes metrics to
/// subscribing plugins.
pub trait PluginRuntime: Producer {
    /// Hand `metric` to every subscribing plugin, returning how many were
    /// reached. Zero is a valid outcome.
    fn distribute(&self, metric: &Metric) -> Result<usize, DeliveryError>;

    /// Pending delivery queue length per plugin.
    fn queue_depths(&self) -> Result<HashMap<String, usize>, ProducerError>;

    /// Raw metric definitions per plugin. Advisory only.
    fn metric_definitions(&self) -> HashMap<String, Vec<Value>> {
        HashMap::new()
    }
}

/// The hardware metrics collector.
pub trait Collector: Producer {
    /// Configured collection interval, in seconds, per metric type. May hold
    /// the `load_configuration` pseudo type.
    fn intervals(&self) -> Result<HashMap<String, u64>, ProducerError>;

    /// Raw definitions of the collector's metrics. Advisory only.
    fn definitions(&self) -> Vec<Value> {
        Vec::new()
    }
}

/// Validate one raw record and, if accepted, count it inbound and push a copy
/// onto each queue.
pub fn ingest(ctx: &Context, raw: Value) -> Result<(), ValidationError> {
    let metric = Metric::from_value(raw)?;
    ctx.rates.record_inbound(&metric.rate_key());
    ctx.queues.push(metric);
    Ok(())
}

/// Ingest one record from `producer`, reporting a refusal through the
/// logger of the record's source. Returns true if the record was accepted.
pub fn feed<P>(ctx: &Context, producer: &P, raw: Value) -> bool
where
    P: Producer + ?Sized,
{
    let source = raw.get("source")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    match ingest(ctx, raw) {
        Ok(()) => true,
        Err(e) => {
            debug!("dropping metric from {:?}: {}", source, e);
            let reason = format!("{}", e);
            if let Err(panic) = util::guarded(|| (producer.logger(&source))(&reason)) {
                error!("logger for {:?} panicked: {}", source, panic);
            }
            false
        }
    }
}

/// Perform one ingestion pass over `producer`. Returns the number of accepted
/// records.
pub fn pass<P>(ctx: &Context, producer: &P) -> Result<usize, ProducerError>
where
    P: Producer + ?Sized,
{
    let records = match util::guarded(|| producer.collect()) {
        Ok(res) => res?,
        Err(panic) => return Err(ProducerError::Panicked(panic)),
    };
    let mut accepted = 0;
    for raw in records {
        if feed(ctx, producer, raw) {
            accepted += 1;
        }
    }
    Ok(accepted)
}

/// The ingestion loop. Runs a pass at most once per ingestion interval until
/// the context is stopped.
pub fn run<P>(ctx: &Context, producer: &P, name: &str)
where
    P: Producer + ?Sized,
{
    info!("ingestion for {} started", name);
    while !ctx.stopped() {
        let started = Instant::now();
        match pass(ctx, producer) {
            Ok(accepted) => trace!("ingested {} metrics from {}", accepted, name),
            Err(e) => error!("could not collect metrics from {}: {}", name, e),
        }
        if ctx.stopped() {
            break;
        }
        if let Some(delay) = time::pace(ctx.cadence.ingest, started, ctx.cadence.idle) {
            if !time::sleep_unless(delay, ctx.cadence.idle, || ctx.stopped()) {
                break;
            }
        }
    }
    info!("ingestion for {} stopped", name);
}
