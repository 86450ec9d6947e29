//! Binary entrypoint for the echo shard processor.
//!
//! A supervisor launches this binary once per shard and speaks the line
//! protocol over its standard streams.

use std::io::{self, Write};
use std::process::ExitCode;

use shardwire::telemetry;
use shardwire_config::{Config, ConfigError};
use shardwire_echo::EchoProcessor;

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(ConfigError::Parse(request)) if !request.use_stderr() => {
            // --help and --version
            request.print().ok();
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            writeln!(io::stderr().lock(), "{error}").ok();
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = telemetry::initialise(&config) {
        writeln!(io::stderr().lock(), "{error}").ok();
        return ExitCode::FAILURE;
    }

    shardwire::run_stdio(EchoProcessor::from_config(&config))
}
