//! The dispatch loop: one inbound action at a time, routed to the processor
//! and answered with a status.
//!
//! The loop enforces the lifecycle order itself instead of trusting the
//! supervisor: an action that is not valid in the current
//! [`LifecycleState`] is fatal. Errors are returned, never acted upon, so
//! the caller decides how to terminate.

mod lifecycle;

use std::io::{BufRead, Write};

use tracing::{debug, info, info_span};

pub use self::lifecycle::LifecycleState;
use crate::checkpoint::{Checkpointer, StreamCheckpointer};
use crate::codec;
use crate::error::ShimError;
use crate::processor::{ProcessorError, RecordProcessor};
use crate::protocol::{Action, ActionKind, ShutdownAction, ShutdownReason, StatusAction};
use crate::transport::LineTransport;

/// Drives a [`RecordProcessor`] from a supervisor message stream.
pub struct Dispatcher<P, R, W> {
    processor: P,
    transport: LineTransport<R, W>,
    state: LifecycleState,
}

impl<P, R, W> Dispatcher<P, R, W>
where
    P: RecordProcessor,
    R: BufRead,
    W: Write,
{
    /// Creates a dispatcher reading from `reader` and writing to `writer`.
    #[must_use]
    pub const fn new(processor: P, reader: R, writer: W) -> Self {
        Self {
            processor,
            transport: LineTransport::new(reader, writer),
            state: LifecycleState::Uninitialized,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Consumes the dispatcher, returning the processor and transport.
    #[must_use]
    pub fn into_parts(self) -> (P, LineTransport<R, W>) {
        (self.processor, self.transport)
    }

    /// Handles messages until end of input.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`ShimError`]; nothing further is read or
    /// written after it.
    pub fn run(&mut self) -> Result<(), ShimError> {
        while let Some(line) = self.transport.read_message()? {
            self.dispatch_line(&line)?;
        }
        info!(state = %self.state, "supervisor closed input");
        Ok(())
    }

    /// Handles a single inbound line and emits its status.
    ///
    /// # Errors
    ///
    /// Returns a [`ShimError`] if the line cannot be decoded, is out of
    /// order, or the processor fails.
    pub fn dispatch_line(&mut self, line: &str) -> Result<(), ShimError> {
        let action = codec::decode(line)?;
        let kind = action.kind();
        let span = info_span!("dispatch", action = %kind);
        let _entered = span.enter();

        let next = self
            .state
            .transition(kind)
            .ok_or(ShimError::UnexpectedAction {
                action: kind,
                state: self.state,
            })?;

        self.route(action)?;
        debug!(from = %self.state, to = %next, "handled action");
        self.state = next;
        self.acknowledge(kind)
    }

    fn route(&mut self, action: Action) -> Result<(), ShimError> {
        let kind = action.kind();
        match action {
            Action::Initialize(init) => {
                info!(
                    shard_id = init.shard_id(),
                    sequence_number = init.sequence_number(),
                    sub_sequence_number = init.sub_sequence_number(),
                    "initializing shard"
                );
                let outcome = self.processor.initialize(
                    init.shard_id(),
                    init.sequence_number(),
                    init.sub_sequence_number(),
                );
                processor_outcome(kind, outcome)
            }
            Action::ProcessRecords(batch) => {
                debug!(
                    records = batch.records().len(),
                    millis_behind_latest = batch.millis_behind_latest(),
                    "delivering records"
                );
                self.with_checkpointer(kind, |processor, checkpointer| {
                    processor.process_records(
                        batch.records(),
                        batch.millis_behind_latest(),
                        checkpointer,
                    )
                })
            }
            Action::ShutdownRequested(_) => self.with_checkpointer(kind, |processor, checkpointer| {
                processor.shutdown_requested(checkpointer)
            }),
            Action::ShardEnded(_) => self.shard_ended(kind),
            Action::LeaseLost(_) => self.lease_lost(kind),
            Action::Shutdown(shutdown) => self.legacy_shutdown(&shutdown),
            Action::Checkpoint(_) | Action::Status(_) => Err(ShimError::UnexpectedAction {
                action: kind,
                state: self.state,
            }),
        }
    }

    fn legacy_shutdown(&mut self, shutdown: &ShutdownAction) -> Result<(), ShimError> {
        let reason = shutdown
            .parsed_reason()
            .map_err(|_| ShimError::MalformedAction {
                action: Some(ActionKind::Shutdown.to_string()),
                message: format!("unknown shutdown reason '{}'", shutdown.reason()),
                source: None,
            })?;
        info!(%reason, "legacy shutdown");
        match reason {
            ShutdownReason::Terminate => self.shard_ended(ActionKind::Shutdown),
            ShutdownReason::Zombie => self.lease_lost(ActionKind::Shutdown),
        }
    }

    fn shard_ended(&mut self, kind: ActionKind) -> Result<(), ShimError> {
        info!("shard ended");
        self.with_checkpointer(kind, |processor, checkpointer| {
            processor.shard_ended(checkpointer)
        })
    }

    fn lease_lost(&mut self, kind: ActionKind) -> Result<(), ShimError> {
        info!("lease lost");
        processor_outcome(kind, self.processor.lease_lost())
    }

    fn with_checkpointer<F>(&mut self, kind: ActionKind, callback: F) -> Result<(), ShimError>
    where
        F: FnOnce(&mut P, &mut dyn Checkpointer) -> Result<(), ProcessorError>,
    {
        let mut checkpointer = StreamCheckpointer::new(&mut self.transport, kind);
        let outcome = callback(&mut self.processor, &mut checkpointer);
        if let Some(fault) = checkpointer.into_fault() {
            return Err(ShimError::Handshake {
                action: kind,
                source: fault,
            });
        }
        processor_outcome(kind, outcome)
    }

    fn acknowledge(&mut self, kind: ActionKind) -> Result<(), ShimError> {
        let line = codec::encode(&Action::Status(StatusAction::new(kind)))?;
        self.transport.write_message(&line)?;
        Ok(())
    }
}

fn processor_outcome(
    action: ActionKind,
    outcome: Result<(), ProcessorError>,
) -> Result<(), ShimError> {
    outcome.map_err(|source| ShimError::Processor { action, source })
}
