//! Runtime configuration shared by shard processor binaries.
//!
//! Supervisors usually launch their child processes without arguments, so
//! every setting can also be supplied through a `SHARDWIRE_*` environment
//! variable. Command-line flags take precedence over the environment.

mod defaults;
mod logging;

use std::ffi::OsString;

use clap::Parser;
use thiserror::Error;

pub use self::defaults::{
    DEFAULT_CHECKPOINT_EVERY, DEFAULT_CHECKPOINT_RETRIES, DEFAULT_LOG_FILTER, default_log_format,
};
pub use self::logging::LogFormat;

/// Configuration for a shim process.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "shardwire", about = "Shard record processor for a multi-language supervisor")]
pub struct Config {
    /// Tracing filter expression applied to diagnostic output.
    #[arg(long, env = "SHARDWIRE_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,

    /// Diagnostic output format.
    #[arg(
        long,
        env = "SHARDWIRE_LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value_t = default_log_format()
    )]
    log_format: LogFormat,

    /// Records between periodic checkpoints; zero disables them.
    #[arg(long, env = "SHARDWIRE_CHECKPOINT_EVERY", default_value_t = DEFAULT_CHECKPOINT_EVERY)]
    checkpoint_every: u64,

    /// Retries allowed for a checkpoint the supervisor rejected.
    #[arg(long, env = "SHARDWIRE_CHECKPOINT_RETRIES", default_value_t = DEFAULT_CHECKPOINT_RETRIES)]
    checkpoint_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            checkpoint_retries: DEFAULT_CHECKPOINT_RETRIES,
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when an argument or environment value
    /// is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is treated as the binary name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when an argument or environment value
    /// is invalid.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(ConfigError::Parse)
    }

    /// Returns the tracing filter expression.
    #[must_use]
    pub const fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the diagnostic output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the number of records between periodic checkpoints.
    #[must_use]
    pub const fn checkpoint_every(&self) -> u64 {
        self.checkpoint_every
    }

    /// Returns how many times a rejected checkpoint may be retried.
    #[must_use]
    pub const fn checkpoint_retries(&self) -> u32 {
        self.checkpoint_retries
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Arguments or environment values failed to parse.
    #[error("invalid configuration: {0}")]
    Parse(#[source] clap::Error),
}
