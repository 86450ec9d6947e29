//! The callback contract implemented by shard processing code.

use crate::checkpoint::Checkpointer;
use crate::protocol::Record;

/// Error type returned by processor callbacks.
///
/// Any error aborts the process; there is no per-callback recovery.
pub type ProcessorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Business logic driven by the dispatch loop.
///
/// Callbacks run one at a time and in protocol order: `initialize` first,
/// then any number of `process_records` and `shutdown_requested` calls, then
/// exactly one of `lease_lost` or `shard_ended`.
pub trait RecordProcessor {
    /// Called once with the shard assignment and the last checkpointed
    /// position, if there is one.
    ///
    /// # Errors
    ///
    /// Any error terminates the process.
    fn initialize(
        &mut self,
        shard_id: &str,
        sequence_number: Option<&str>,
        sub_sequence_number: Option<u64>,
    ) -> Result<(), ProcessorError>;

    /// Called for each batch of records.
    ///
    /// # Errors
    ///
    /// Any error terminates the process.
    fn process_records(
        &mut self,
        records: &[Record],
        millis_behind_latest: u64,
        checkpointer: &mut dyn Checkpointer,
    ) -> Result<(), ProcessorError>;

    /// Called when the lease has been revoked. Checkpointing is no longer
    /// possible.
    ///
    /// # Errors
    ///
    /// Any error terminates the process.
    fn lease_lost(&mut self) -> Result<(), ProcessorError>;

    /// Called when the shard is exhausted.
    ///
    /// Implementations must checkpoint before returning, otherwise the
    /// supervisor will not start processing the child shards.
    ///
    /// # Errors
    ///
    /// Any error terminates the process.
    fn shard_ended(&mut self, checkpointer: &mut dyn Checkpointer) -> Result<(), ProcessorError>;

    /// Called when the worker is shutting down. Checkpointing is still
    /// possible and a `lease_lost` may follow.
    ///
    /// # Errors
    ///
    /// Any error terminates the process.
    fn shutdown_requested(
        &mut self,
        checkpointer: &mut dyn Checkpointer,
    ) -> Result<(), ProcessorError>;
}

impl<P> RecordProcessor for &mut P
where
    P: RecordProcessor + ?Sized,
{
    fn initialize(
        &mut self,
        shard_id: &str,
        sequence_number: Option<&str>,
        sub_sequence_number: Option<u64>,
    ) -> Result<(), ProcessorError> {
        (**self).initialize(shard_id, sequence_number, sub_sequence_number)
    }

    fn process_records(
        &mut self,
        records: &[Record],
        millis_behind_latest: u64,
        checkpointer: &mut dyn Checkpointer,
    ) -> Result<(), ProcessorError> {
        (**self).process_records(records, millis_behind_latest, checkpointer)
    }

    fn lease_lost(&mut self) -> Result<(), ProcessorError> {
        (**self).lease_lost()
    }

    fn shard_ended(&mut self, checkpointer: &mut dyn Checkpointer) -> Result<(), ProcessorError> {
        (**self).shard_ended(checkpointer)
    }

    fn shutdown_requested(
        &mut self,
        checkpointer: &mut dyn Checkpointer,
    ) -> Result<(), ProcessorError> {
        (**self).shutdown_requested(checkpointer)
    }
}
