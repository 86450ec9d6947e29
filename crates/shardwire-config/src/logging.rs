use clap::ValueEnum;
use strum::Display;

/// Format of the diagnostic stream written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event, for log shippers tailing the supervisor.
    #[default]
    Json,
    /// Single-line human-readable events.
    Compact,
}
