//! gateway-metrics collects operational metrics from a gateway's plugins and
//! its hardware-facing collector, validates them and redistributes them to
//! plugin subscribers and internal receivers. Throughput is tracked as
//! cumulative counters and fed back into the pipeline as the gateway's own
//! health telemetry.
//!
//! The moving parts are:
//!
//!  * two ingestion workers, one per producer class, polling at ~1 Hz,
//!  * a pair of FIFO queues, one for plugin consumers and one for internal
//!    receivers,
//!  * two distribution workers draining those queues,
//!  * an internal stats worker reporting queue depths, rates and collection
//!    intervals every ten seconds,
//!  * a windowed, de-duplicating cache meant for periodic upload.
//!
//! See `pipeline::Pipeline` for the entry point.
#![allow(unknown_lints)]
#![deny(trivial_numeric_casts, missing_docs, unstable_features, unused_import_braces)]
extern crate chrono;
extern crate clap;
extern crate serde;
extern crate toml;

#[macro_use]
extern crate serde_json;

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate serde_derive;

#[cfg(test)]
extern crate quickcheck;

pub mod config;
pub mod constants;
pub mod metric;
pub mod pipeline;
pub mod queue;
pub mod rates;
pub mod sink;
pub mod source;
pub mod time;
pub mod util;
