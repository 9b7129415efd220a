//! The gateway's self-telemetry.
//!
//! Every stats interval the pipeline reports on itself: how deep its queues
//! are, how deep each plugin's delivery queue is, how many metrics went in and
//! out per rate key and how often the hardware collector gathers each metric
//! type. These reports are ordinary metrics and travel back through ingestion
//! like any other, which means they are themselves counted and distributed.

use constants::{GATEWAY, LOAD_CONFIGURATION, OPENMOTICS, SYSTEM, TARGET_OPENMOTICS,
                TARGET_PLUGINS};
use pipeline::Context;
use serde_json::{Map, Value};
use source::{self, Collector, PluginRuntime, ProducerError};
use std::collections::BTreeMap;
use time;
use util;

fn report(now: f64, tag: &str, tag_value: &str, values: Value) -> Value {
    let mut tags = Map::new();
    tags.insert("name".to_string(), Value::from(GATEWAY));
    tags.insert(tag.to_string(), Value::from(tag_value));
    json!({
        "source": OPENMOTICS,
        "type": SYSTEM,
        "timestamp": now,
        "tags": tags,
        "values": values,
    })
}

/// Build this tick's self-telemetry records, stamped `now`.
pub fn synthesize<R, C>(
    ctx: &Context,
    runtime: &R,
    collector: &C,
    now: f64,
) -> Result<Vec<Value>, ProducerError>
where
    R: PluginRuntime + ?Sized,
    C: Collector + ?Sized,
{
    let mut reports = Vec::new();

    reports.push(report(
        now,
        "target",
        TARGET_PLUGINS,
        json!({"queue_length": ctx.queues.plugins.len()}),
    ));
    reports.push(report(
        now,
        "target",
        TARGET_OPENMOTICS,
        json!({"queue_length": ctx.queues.internal.len()}),
    ));

    let depths: BTreeMap<String, usize> = runtime.queue_depths()?.into_iter().collect();
    for (plugin, depth) in depths {
        reports.push(report(now, "target", &plugin, json!({"queue_length": depth})));
    }

    let (inbound, outbound) = ctx.rates.snapshot();
    for key in ctx.rates.keys() {
        let metrics_in = inbound.get(&key).cloned().unwrap_or(0);
        let metrics_out = outbound.get(&key).cloned().unwrap_or(0);
        reports.push(report(
            now,
            "namespace",
            &key,
            json!({"metrics_in": metrics_in, "metrics_out": metrics_out}),
        ));
    }

    let intervals: BTreeMap<String, u64> = collector.intervals()?.into_iter().collect();
    for (metric_type, interval) in intervals {
        if metric_type == LOAD_CONFIGURATION {
            continue;
        }
        reports.push(report(
            now,
            "metric_type",
            &metric_type,
            json!({"metric_interval": interval}),
        ));
    }

    Ok(reports)
}

/// Synthesize one tick of self-telemetry and feed it through ingestion.
/// Returns the number of records accepted.
pub fn tick<R, C>(ctx: &Context, runtime: &R, collector: &C) -> Result<usize, ProducerError>
where
    R: PluginRuntime + ?Sized,
    C: Collector + ?Sized,
{
    let reports = synthesize(ctx, runtime, collector, time::now())?;
    let mut accepted = 0;
    for raw in reports {
        match source::ingest(ctx, raw) {
            Ok(()) => accepted += 1,
            Err(e) => error!("refused internal metric: {}", e),
        }
    }
    Ok(accepted)
}

/// The stats loop. Ticks immediately, then once per stats interval until the
/// context is stopped. The wait between ticks is cut short by a stop request.
pub fn run<R, C>(ctx: &Context, runtime: &R, collector: &C)
where
    R: PluginRuntime + ?Sized,
    C: Collector + ?Sized,
{
    info!("internal stats started");
    while !ctx.stopped() {
        match util::guarded(|| tick(ctx, runtime, collector)) {
            Ok(Ok(accepted)) => trace!("reported {} internal metrics", accepted),
            Ok(Err(e)) => error!("could not collect metric metrics: {}", e),
            Err(panic) => error!("could not collect metric metrics: {}", panic),
        }
        if !time::sleep_unless(ctx.cadence.stats, ctx.cadence.idle, || ctx.stopped()) {
            break;
        }
    }
    info!("internal stats stopped");
}
