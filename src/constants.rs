//! Library level constants

/// Rate key holding the sum of every other key of a `rates::RateTracker`.
pub const TOTAL: &str = "total";

/// Source under which the gateway reports its own metrics, and under which
/// the hardware collector's definitions are registered.
pub const OPENMOTICS: &str = "OpenMotics";

/// Metric type of every self-reported gateway metric.
pub const SYSTEM: &str = "system";

/// Value of the `name` tag on self-reported gateway metrics.
pub const GATEWAY: &str = "gateway";

/// `target` tag value for the plugin queue's depth.
pub const TARGET_PLUGINS: &str = "plugins";

/// `target` tag value for the internal queue's depth.
pub const TARGET_OPENMOTICS: &str = "openmotics";

/// Pseudo metric type exposed among the collector's intervals. It is not a
/// metric and is never reported.
pub const LOAD_CONFIGURATION: &str = "load_configuration";

/// Default width, in seconds, of a cache window.
pub const DEFAULT_WINDOW: u64 = 300;

/// Default age, in seconds, past which cache windows are evicted.
pub const DEFAULT_RETENTION: u64 = 60 * 60 * 24;

/// Default period of an ingestion pass, in milliseconds.
pub const DEFAULT_INGEST_INTERVAL_MS: u64 = 1_000;

/// Default delay, in milliseconds, between polls of an empty queue. Also the
/// minimum pause between two ingestion passes.
pub const DEFAULT_IDLE_DELAY_MS: u64 = 100;

/// Default period of the internal stats worker, in seconds.
pub const DEFAULT_STATS_INTERVAL: u64 = 10;
