//! Checkpoint request/acknowledgement handshake.
//!
//! A checkpoint is issued from inside a processor callback. The request is
//! written to the supervisor and the handshake then blocks on the same input
//! stream the dispatch loop reads, until the acknowledgement arrives. The
//! supervisor sends nothing else while a checkpoint is outstanding, so any
//! other message means the two sides have desynchronised.

use std::io::{BufRead, Write};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::{self, CodecError};
use crate::protocol::{Action, ActionKind, CheckpointAction};
use crate::transport::{LineTransport, TransportError};

/// Checkpoint capability handed to processor callbacks.
///
/// A handle is only valid for the duration of the callback it was passed to.
pub trait Checkpointer {
    /// Checkpoints at a specific sequence and sub-sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Rejected`] when the supervisor refuses the
    /// checkpoint; any other variant is fatal for the process.
    fn checkpoint_at(
        &mut self,
        sequence_number: &str,
        sub_sequence_number: u64,
    ) -> Result<(), CheckpointError>;

    /// Checkpoints at the most recently delivered record.
    ///
    /// # Errors
    ///
    /// As for [`Checkpointer::checkpoint_at`].
    fn checkpoint_latest(&mut self) -> Result<(), CheckpointError>;
}

/// Reasons the acknowledgement could not be matched to the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesyncReason {
    /// Input ended while the acknowledgement was outstanding.
    #[error("input ended before the acknowledgement arrived")]
    EndOfInput,
    /// A different action arrived in place of the acknowledgement.
    #[error("expected a checkpoint acknowledgement, received {0}")]
    UnexpectedAction(ActionKind),
    /// The reply could not be decoded.
    #[error("acknowledgement could not be decoded: {0}")]
    Undecodable(String),
}

/// Errors surfaced by a checkpoint attempt.
#[derive(Debug, Clone, Error)]
pub enum CheckpointError {
    /// The supervisor acknowledged the request with an error.
    #[error("supervisor rejected checkpoint: {message}")]
    Rejected {
        /// Error text from the acknowledgement.
        message: String,
    },

    /// The reply did not match the request.
    #[error("checkpoint handshake desynchronised while handling {responding_to}: {reason}")]
    Desync {
        /// Inbound action whose callback issued the checkpoint.
        responding_to: ActionKind,
        /// What went wrong.
        reason: DesyncReason,
    },

    /// The request could not be written or the reply could not be read.
    #[error("checkpoint transport failed")]
    Transport(#[source] Arc<TransportError>),

    /// The request could not be encoded.
    #[error("checkpoint request could not be encoded")]
    Encode(#[source] Arc<CodecError>),
}

impl CheckpointError {
    /// Returns `true` when the caller may retry or carry on.
    ///
    /// Only a supervisor-side rejection is recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// [`Checkpointer`] bound to the dispatch loop's transport.
///
/// The first fatal failure is retained: later calls fail immediately with
/// the same error, and the dispatch loop aborts once the callback returns.
pub struct StreamCheckpointer<'a, R, W> {
    transport: &'a mut LineTransport<R, W>,
    responding_to: ActionKind,
    fault: Option<CheckpointError>,
}

impl<'a, R, W> StreamCheckpointer<'a, R, W>
where
    R: BufRead,
    W: Write,
{
    /// Binds a checkpointer to `transport` for the callback handling
    /// `responding_to`.
    #[must_use]
    pub const fn new(transport: &'a mut LineTransport<R, W>, responding_to: ActionKind) -> Self {
        Self {
            transport,
            responding_to,
            fault: None,
        }
    }

    /// Returns the fatal failure recorded during the callback, if any.
    #[must_use]
    pub fn into_fault(self) -> Option<CheckpointError> {
        self.fault
    }

    fn handshake(&mut self, request: CheckpointAction) -> Result<(), CheckpointError> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }

        let outcome = self.exchange(request);
        if let Err(error) = &outcome {
            if error.is_recoverable() {
                warn!(responding_to = %self.responding_to, %error, "checkpoint rejected");
            } else {
                self.fault = Some(error.clone());
            }
        }
        outcome
    }

    fn exchange(&mut self, request: CheckpointAction) -> Result<(), CheckpointError> {
        debug!(
            responding_to = %self.responding_to,
            sequence_number = request.sequence_number(),
            sub_sequence_number = request.sub_sequence_number(),
            "requesting checkpoint"
        );
        let line = codec::encode(&Action::Checkpoint(request))
            .map_err(|error| CheckpointError::Encode(Arc::new(error)))?;
        self.transport
            .write_message(&line)
            .map_err(|error| CheckpointError::Transport(Arc::new(error)))?;

        let reply = self
            .transport
            .read_message()
            .map_err(|error| CheckpointError::Transport(Arc::new(error)))?
            .ok_or_else(|| self.desync(DesyncReason::EndOfInput))?;

        match codec::decode(&reply) {
            Ok(Action::Checkpoint(ack)) => ack.into_error().map_or_else(
                || {
                    debug!(responding_to = %self.responding_to, "checkpoint acknowledged");
                    Ok(())
                },
                |message| Err(CheckpointError::Rejected { message }),
            ),
            Ok(other) => Err(self.desync(DesyncReason::UnexpectedAction(other.kind()))),
            Err(error) => Err(self.desync(DesyncReason::Undecodable(error.to_string()))),
        }
    }

    const fn desync(&self, reason: DesyncReason) -> CheckpointError {
        CheckpointError::Desync {
            responding_to: self.responding_to,
            reason,
        }
    }
}

impl<R, W> Checkpointer for StreamCheckpointer<'_, R, W>
where
    R: BufRead,
    W: Write,
{
    fn checkpoint_at(
        &mut self,
        sequence_number: &str,
        sub_sequence_number: u64,
    ) -> Result<(), CheckpointError> {
        self.handshake(CheckpointAction::at(sequence_number, sub_sequence_number))
    }

    fn checkpoint_latest(&mut self) -> Result<(), CheckpointError> {
        self.handshake(CheckpointAction::latest())
    }
}
