//! Pipeline wiring and lifecycle.
//!
//! All state the five workers share lives in one `Context`: the queues, the
//! rate trackers, the receiver list, the pacing and the stop flag. A
//! `Pipeline` owns the context together with its collaborators and starts and
//! stops the workers around it.

use config::Args;
use constants;
use metric::Definitions;
use queue::DualQueue;
use rates::Rates;
use sink::{self, CloudCache, Receiver, Receivers};
use source::{self, internal, Collector, PluginRuntime};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// How often the workers run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cadence {
    /// Period of an ingestion pass.
    pub ingest: Duration,
    /// Delay between polls of an empty queue, and the least pause between
    /// two ingestion passes.
    pub idle: Duration,
    /// Period of the internal stats worker.
    pub stats: Duration,
}

impl Default for Cadence {
    fn default() -> Cadence {
        Cadence {
            ingest: Duration::from_millis(constants::DEFAULT_INGEST_INTERVAL_MS),
            idle: Duration::from_millis(constants::DEFAULT_IDLE_DELAY_MS),
            stats: Duration::from_secs(constants::DEFAULT_STATS_INTERVAL),
        }
    }
}

impl<'a> From<&'a Args> for Cadence {
    fn from(args: &'a Args) -> Cadence {
        Cadence {
            ingest: Duration::from_millis(args.ingest_interval_ms),
            idle: Duration::from_millis(args.idle_delay_ms),
            stats: Duration::from_secs(args.stats_interval),
        }
    }
}

/// State shared by every worker of a pipeline.
#[derive(Debug, Default)]
pub struct Context {
    /// The plugin and internal queues.
    pub queues: DualQueue,
    /// Inbound and outbound throughput.
    pub rates: Rates,
    /// Receivers fed by internal distribution.
    pub receivers: Receivers,
    /// Worker pacing.
    pub cadence: Cadence,
    stop: AtomicBool,
}

impl Context {
    /// Create a context with empty queues and rates and no receivers.
    pub fn new(cadence: Cadence) -> Context {
        Context {
            queues: DualQueue::new(),
            rates: Rates::new(),
            receivers: Receivers::new(),
            cadence: cadence,
            stop: AtomicBool::new(false),
        }
    }

    /// True once a stop was requested.
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Ask every worker to exit after its current unit of work.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Assemble the advisory definitions known at startup: the gateway's own,
/// the hardware collector's and every plugin's.
pub fn load_definitions<R, C>(runtime: &R, collector: &C) -> Definitions
where
    R: PluginRuntime + ?Sized,
    C: Collector + ?Sized,
{
    let mut definitions = Definitions::with_system();
    let collector_log = collector.logger(constants::OPENMOTICS);
    definitions.load(constants::OPENMOTICS, &collector.definitions(), |msg| {
        collector_log(msg)
    });
    for (plugin, raw) in runtime.metric_definitions() {
        let log = runtime.logger(&plugin);
        let loaded = definitions.load(&plugin, &raw, |msg| log(msg));
        debug!("loaded {} of {} metric definitions for {}", loaded, raw.len(), plugin);
    }
    definitions
}

/// The metrics pipeline.
pub struct Pipeline {
    ctx: Arc<Context>,
    runtime: Arc<dyn PluginRuntime>,
    collector: Arc<dyn Collector>,
    cache: CloudCache,
    workers: Vec<thread::JoinHandle<()>>,
}

impl Pipeline {
    /// Create a pipeline around the given collaborators. The cloud cache is
    /// registered as the first receiver. No worker runs until `start`.
    pub fn new(
        args: &Args,
        runtime: Arc<dyn PluginRuntime>,
        collector: Arc<dyn Collector>,
    ) -> Pipeline {
        let definitions = load_definitions(&*runtime, &*collector);
        info!("{} metric definitions loaded", definitions.len());
        let cache = CloudCache::new(args.window, args.retention, Arc::new(definitions));
        let ctx = Arc::new(Context::new(Cadence::from(args)));
        ctx.receivers.add(cache.clone());
        Pipeline {
            ctx: ctx,
            runtime: runtime,
            collector: collector,
            cache: cache,
            workers: Vec::new(),
        }
    }

    /// The shared state of this pipeline.
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// A handle on the cloud cache, for the uploader.
    pub fn cache(&self) -> CloudCache {
        self.cache.clone()
    }

    /// Register `receiver` after every previously registered one. May be
    /// called while the pipeline runs.
    pub fn add_receiver<R>(&self, receiver: R)
    where
        R: Receiver + 'static,
    {
        self.ctx.receivers.add(receiver);
    }

    fn spawn<F>(&mut self, name: &str, f: F) -> io::Result<()>
    where
        F: FnOnce(Arc<Context>) + Send + 'static,
    {
        let ctx = Arc::clone(&self.ctx);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || f(ctx))?;
        self.workers.push(handle);
        Ok(())
    }

    /// Launch the five workers in the background and return.
    pub fn start(&mut self) -> io::Result<()> {
        let runtime = Arc::clone(&self.runtime);
        self.spawn("metrics collector for plugins", move |ctx| {
            source::run(&ctx, &*runtime, "plugins")
        })?;

        let collector = Arc::clone(&self.collector);
        self.spawn("metrics collector for openmotics", move |ctx| {
            source::run(&ctx, &*collector, "openmotics")
        })?;

        let runtime = Arc::clone(&self.runtime);
        let collector = Arc::clone(&self.collector);
        self.spawn("metrics internal stats", move |ctx| {
            internal::run(&ctx, &*runtime, &*collector)
        })?;

        let runtime = Arc::clone(&self.runtime);
        self.spawn("metrics distributor for plugins", move |ctx| {
            sink::run_plugins(&ctx, &*runtime)
        })?;

        self.spawn("metrics distributor for openmotics", move |ctx| {
            sink::run_internal(&ctx)
        })?;

        info!("metrics pipeline started");
        Ok(())
    }

    /// Request every worker to stop. Does not wait for them.
    pub fn stop(&self) {
        info!("metrics pipeline stopping");
        self.ctx.request_stop();
    }

    /// Wait for every started worker to exit. Only returns once `stop` was
    /// called.
    pub fn join(&mut self) {
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                error!("{} exited by panic", name);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use metric::Metric;
    use serde_json::Value;
    use sink::DeliveryError;
    use source::{Logger, NullCollector, NullRuntime, Producer, ProducerError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct Plugins {
        logged: Arc<Mutex<Vec<String>>>,
    }

    impl Producer for Plugins {
        fn collect(&self) -> Result<Vec<Value>, ProducerError> {
            Ok(Vec::new())
        }

        fn logger(&self, source: &str) -> Logger {
            let logged = Arc::clone(&self.logged);
            let source = source.to_string();
            Box::new(move |msg: &str| logged.lock().unwrap().push(format!("{}: {}", source, msg)))
        }
    }

    impl PluginRuntime for Plugins {
        fn distribute(&self, _: &Metric) -> Result<usize, DeliveryError> {
            Ok(1)
        }

        fn queue_depths(&self) -> Result<HashMap<String, usize>, ProducerError> {
            Ok(HashMap::new())
        }

        fn metric_definitions(&self) -> HashMap<String, Vec<Value>> {
            let mut defs = HashMap::new();
            defs.insert(
                "thermo".to_string(),
                vec![
                    json!({"type": "temperature", "name": "room", "description": "",
                           "mtype": "gauge", "unit": "C", "tags": ["id"]}),
                    json!({"type": "temperature", "name": "broken"}),
                ],
            );
            defs
        }
    }

    #[test]
    fn definitions_merge_system_collector_and_plugins() {
        let plugins = Plugins {
            logged: Arc::new(Mutex::new(Vec::new())),
        };
        let defs = load_definitions(&plugins, &NullCollector::default());
        assert_eq!(5, defs.len());
        assert!(defs.get("thermo", "temperature", "room").is_some());
        assert!(defs.get("thermo", "temperature", "broken").is_none());
        let logged = plugins.logged.lock().unwrap();
        assert_eq!(1, logged.len());
        assert!(logged[0].starts_with("thermo: "));
    }

    #[test]
    fn cache_is_first_receiver() {
        let pipeline = Pipeline::new(
            &Args::default(),
            Arc::new(NullRuntime::default()),
            Arc::new(NullCollector::default()),
        );
        assert_eq!(1, pipeline.context().receivers.len());
        pipeline.add_receiver(|_: &Metric| -> Result<(), DeliveryError> { Ok(()) });
        assert_eq!(2, pipeline.context().receivers.len());
    }

    #[test]
    fn cadence_follows_args() {
        let mut args = Args::default();
        args.ingest_interval_ms = 250;
        args.idle_delay_ms = 5;
        args.stats_interval = 2;
        let cadence = Cadence::from(&args);
        assert_eq!(Duration::from_millis(250), cadence.ingest);
        assert_eq!(Duration::from_millis(5), cadence.idle);
        assert_eq!(Duration::from_secs(2), cadence.stats);
        assert_eq!(Cadence::default(), Cadence::from(&Args::default()));
    }

    #[test]
    fn stop_is_shared() {
        let ctx = Context::default();
        assert!(!ctx.stopped());
        ctx.request_stop();
        assert!(ctx.stopped());
    }
}
