#![allow(unknown_lints)]

extern crate chan_signal;
extern crate chrono;
extern crate fern;
extern crate gateway_metrics;

#[macro_use]
extern crate log;

use chrono::Utc;
use gateway_metrics::pipeline::Pipeline;
use gateway_metrics::sink::Console;
use gateway_metrics::source::{NullCollector, NullRuntime};
use std::process;
use std::sync::Arc;

fn main() {
    let args = match gateway_metrics::config::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let level = match args.verbose {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    // Signals must be masked before any worker thread exists, or a worker may
    // receive them in place of the main thread.
    let signal =
        chan_signal::notify(&[chan_signal::Signal::INT, chan_signal::Signal::TERM]);

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}][{}] {}",
                record.target(),
                record.line().unwrap_or(0),
                Utc::now().to_rfc3339(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .expect("could not set up logging");

    info!("gateway-metrics - {}", args.version);

    let mut pipeline = Pipeline::new(
        &args,
        Arc::new(NullRuntime::default()),
        Arc::new(NullCollector::default()),
    );
    if args.console {
        pipeline.add_receiver(Console::new());
    }

    if let Err(e) = pipeline.start() {
        error!("could not start metrics pipeline: {}", e);
        process::exit(1);
    }

    match signal.recv() {
        Some(sig) => info!("received {:?}, shutting down", sig),
        None => warn!("signal channel closed, shutting down"),
    }
    pipeline.stop();
    pipeline.join();
    info!("gateway-metrics stopped");
}
