/// Default log filter expression used by the shim binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default number of records between periodic checkpoints.
///
/// Zero disables periodic checkpoints; the reference processor then only
/// checkpoints when the shard ends or a shutdown is requested.
pub const DEFAULT_CHECKPOINT_EVERY: u64 = 0;

/// Default number of retries for a checkpoint the supervisor rejected.
pub const DEFAULT_CHECKPOINT_RETRIES: u32 = 3;

/// Default logging format for the shim binaries.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}
