//! Line-protocol shim between a shard supervisor and record processing code.
//!
//! A supervisor process owns leasing, checkpoint persistence, and stream
//! reads for a shard. It launches one shim process per shard and talks to it
//! over standard I/O using newline-delimited JSON. This crate implements the
//! shim side of that conversation: it decodes each inbound action, invokes
//! the matching [`RecordProcessor`] callback, answers with a status, and
//! performs the checkpoint request/acknowledgement handshake on behalf of
//! the processor.
//!
//! # Example
//!
//! ```rust,no_run
//! use shardwire::{Checkpointer, ProcessorError, Record, RecordProcessor};
//!
//! struct Counter(usize);
//!
//! impl RecordProcessor for Counter {
//!     fn initialize(&mut self, _: &str, _: Option<&str>, _: Option<u64>) -> Result<(), ProcessorError> {
//!         Ok(())
//!     }
//!
//!     fn process_records(
//!         &mut self,
//!         records: &[Record],
//!         _millis_behind_latest: u64,
//!         checkpointer: &mut dyn Checkpointer,
//!     ) -> Result<(), ProcessorError> {
//!         self.0 += records.len();
//!         checkpointer.checkpoint_latest()?;
//!         Ok(())
//!     }
//!
//!     fn lease_lost(&mut self) -> Result<(), ProcessorError> {
//!         Ok(())
//!     }
//!
//!     fn shard_ended(&mut self, checkpointer: &mut dyn Checkpointer) -> Result<(), ProcessorError> {
//!         Ok(checkpointer.checkpoint_latest()?)
//!     }
//!
//!     fn shutdown_requested(&mut self, _: &mut dyn Checkpointer) -> Result<(), ProcessorError> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> std::process::ExitCode {
//!     shardwire::run_stdio(Counter(0))
//! }
//! ```

pub mod checkpoint;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod processor;
pub mod protocol;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod tests;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use tracing::error;

pub use self::checkpoint::{CheckpointError, Checkpointer, DesyncReason, StreamCheckpointer};
pub use self::dispatch::{Dispatcher, LifecycleState};
pub use self::error::ShimError;
pub use self::processor::{ProcessorError, RecordProcessor};
pub use self::protocol::{Action, ActionKind, ArrivalTimestamp, Record};

/// Runs `processor` against the supervisor stream on `reader`/`writer`.
///
/// Returns once input ends.
///
/// # Errors
///
/// Returns the first fatal [`ShimError`].
pub fn run<P, R, W>(processor: P, reader: R, writer: W) -> Result<(), ShimError>
where
    P: RecordProcessor,
    R: BufRead,
    W: Write,
{
    Dispatcher::new(processor, reader, writer).run()
}

/// Runs `processor` over the process's standard streams.
///
/// This is the single place where protocol errors become a process exit
/// status: success on orderly end of input, failure otherwise, with the
/// error chain written to stderr.
#[must_use]
pub fn run_stdio<P>(processor: P) -> ExitCode
where
    P: RecordProcessor,
{
    let stdin = io::stdin();
    let stdout = io::stdout();
    match run(processor, stdin.lock(), stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            error!(
                error = &failure as &(dyn std::error::Error + 'static),
                "terminating after fatal protocol error"
            );
            report_error(&mut io::stderr().lock(), &failure).ok();
            ExitCode::FAILURE
        }
    }
}

/// Writes `error` and its source chain to `stderr`, one cause per line.
///
/// # Errors
///
/// Returns an error if writing to `stderr` fails.
pub fn report_error(stderr: &mut impl Write, error: &ShimError) -> io::Result<()> {
    writeln!(stderr, "{error}")?;
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        writeln!(stderr, "  caused by: {cause}")?;
        source = cause.source();
    }
    Ok(())
}
