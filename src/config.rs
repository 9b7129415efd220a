//! Provides the CLI option parser
//!
//! Used to parse the argv/config file into a struct that
//! the pipeline can consume and use as configuration data.

use clap::{App, Arg};
use constants;
use std::error;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use toml;

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

fn default_version() -> String {
    VERSION.unwrap_or("unknown").to_string()
}

/// Configuration struct for the gateway-metrics executable
///
/// This struct is what we construct from parsing the configuration file.
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Args {
    /// Width of a cloud cache window, in seconds.
    pub window: u64,
    /// Age, in seconds, past which cloud cache windows are evicted.
    pub retention: u64,
    /// Period of an ingestion pass, in milliseconds.
    pub ingest_interval_ms: u64,
    /// Delay between polls of an empty queue, in milliseconds.
    pub idle_delay_ms: u64,
    /// Period of the internal stats worker, in seconds.
    pub stats_interval: u64,
    /// Whether internal metrics are printed to stdout.
    pub console: bool,
    /// The verbosity setting. The higher the value the more chatty we get.
    pub verbose: u64,
    /// Version string. This is set automatically.
    pub version: String,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            window: constants::DEFAULT_WINDOW,
            retention: constants::DEFAULT_RETENTION,
            ingest_interval_ms: constants::DEFAULT_INGEST_INTERVAL_MS,
            idle_delay_ms: constants::DEFAULT_IDLE_DELAY_MS,
            stats_interval: constants::DEFAULT_STATS_INTERVAL,
            console: false,
            verbose: 0,
            version: default_version(),
        }
    }
}

/// Reasons a configuration cannot be loaded.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(io::Error),
    /// The configuration file is not valid TOML.
    Parse(toml::de::Error),
    /// A key holds a value of the wrong type. The second member names the
    /// expected type.
    WrongType(&'static str, &'static str),
    /// A duration key is zero or negative.
    NotPositive(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigError::Io(ref e) => write!(f, "could not read config file: {}", e),
            ConfigError::Parse(ref e) => write!(f, "could not parse config file: {}", e),
            ConfigError::WrongType(key, expected) => {
                write!(f, "config key {} must be of type {}", key, expected)
            }
            ConfigError::NotPositive(key) => write!(f, "config key {} must be positive", key),
        }
    }
}

impl error::Error for ConfigError {
    fn description(&self) -> &str {
        match *self {
            ConfigError::Io(_) => "could not read config file",
            ConfigError::Parse(_) => "could not parse config file",
            ConfigError::WrongType(_, _) => "config key has the wrong type",
            ConfigError::NotPositive(_) => "config key must be positive",
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> ConfigError {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> ConfigError {
        ConfigError::Parse(e)
    }
}

/// Parse the configuration arguments
///
/// This function will read the environment arguments and construct an
/// `Args`. Tunables are stored in an on-disk file; see `--help`.
pub fn parse_args() -> Result<Args, ConfigError> {
    let args = App::new("gateway-metrics")
        .version(VERSION.unwrap_or("unknown"))
        .about("gateway metrics collection and redistribution")
        .arg(
            Arg::with_name("config-file")
                .long("config")
                .short("C")
                .value_name("config")
                .required(true)
                .help("The config file to feed in.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Turn on verbose output."),
        )
        .get_matches();

    let verb = args.occurrences_of("verbose");

    let mut buffer = String::new();
    if let Some(filename) = args.value_of("config-file") {
        let mut fp = File::open(filename)?;
        fp.read_to_string(&mut buffer)?;
    }
    parse_config_file(&buffer, verb)
}

fn positive(value: &toml::Value, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match value.get(key) {
        None => Ok(default),
        Some(v) => match v.as_integer() {
            Some(i) if i > 0 => Ok(i as u64),
            Some(_) => Err(ConfigError::NotPositive(key)),
            None => Err(ConfigError::WrongType(key, "integer")),
        },
    }
}

/// Parse the configuration file.
///
/// Recognized top-level keys are `window`, `retention`,
/// `ingest-interval-ms`, `idle-delay-ms` and `stats-interval`, plus a
/// `[console]` table with an `enabled` flag. Anything else is ignored.
///
/// ```
/// use gateway_metrics::config::parse_config_file;
///
/// let args = parse_config_file("window = 60\n[console]\nenabled = true\n", 1).unwrap();
/// assert_eq!(60, args.window);
/// assert!(args.console);
/// assert_eq!(1, args.verbose);
/// ```
pub fn parse_config_file(buffer: &str, verbosity: u64) -> Result<Args, ConfigError> {
    let mut args = Args::default();
    let value: toml::Value = toml::from_str(buffer)?;

    args.verbose = verbosity;
    args.window = positive(&value, "window", args.window)?;
    args.retention = positive(&value, "retention", args.retention)?;
    args.ingest_interval_ms = positive(&value, "ingest-interval-ms", args.ingest_interval_ms)?;
    args.idle_delay_ms = positive(&value, "idle-delay-ms", args.idle_delay_ms)?;
    args.stats_interval = positive(&value, "stats-interval", args.stats_interval)?;

    if let Some(console) = value.get("console") {
        if console.as_table().is_none() {
            return Err(ConfigError::WrongType("console", "table"));
        }
        args.console = match console.get("enabled") {
            Some(enabled) => match enabled.as_bool() {
                Some(b) => b,
                None => return Err(ConfigError::WrongType("console.enabled", "boolean")),
            },
            None => true,
        };
    }

    Ok(args)
}
