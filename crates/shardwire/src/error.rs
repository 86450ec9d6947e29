//! Fatal errors raised by the dispatch loop.
//!
//! Every variant terminates the process. The only recoverable failure in the
//! protocol, a rejected checkpoint, is returned to the processor as a
//! [`CheckpointError`] and never reaches this type unless the processor
//! chooses to propagate it.

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::codec::CodecError;
use crate::dispatch::LifecycleState;
use crate::processor::ProcessorError;
use crate::protocol::ActionKind;
use crate::transport::TransportError;

/// Errors that abort the dispatch loop.
#[derive(Debug, Error)]
pub enum ShimError {
    /// Reading from or writing to the supervisor failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A line or its payload did not parse.
    #[error("malformed action: {message}")]
    MalformedAction {
        /// Discriminant, when it could be read.
        action: Option<String>,
        /// Human-readable description of the parse failure.
        message: String,
        /// Optional underlying JSON error.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The discriminant is not part of this protocol revision.
    #[error("unsupported action '{action}'")]
    UnsupportedAction {
        /// Discriminant as received.
        action: String,
    },

    /// A known action arrived in a lifecycle state that does not accept it.
    #[error("unexpected {action} action while {state}")]
    UnexpectedAction {
        /// Kind of the offending action.
        action: ActionKind,
        /// State the loop was in.
        state: LifecycleState,
    },

    /// A processor callback reported failure.
    #[error("processor failed while handling {action}")]
    Processor {
        /// Action being handled.
        action: ActionKind,
        /// Error returned by the processor.
        #[source]
        source: ProcessorError,
    },

    /// A checkpoint issued from a callback failed fatally.
    #[error("checkpoint handshake failed while handling {action}")]
    Handshake {
        /// Action being handled.
        action: ActionKind,
        /// Underlying checkpoint failure.
        #[source]
        source: CheckpointError,
    },

    /// An outbound action could not be encoded.
    #[error("failed to encode {action} action")]
    Encode {
        /// Kind of the action being encoded.
        action: ActionKind,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl From<CodecError> for ShimError {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::Malformed { action, source } => Self::MalformedAction {
                message: action.as_ref().map_or_else(
                    || String::from("line is not a JSON action envelope"),
                    |name| format!("{name} payload does not match its schema"),
                ),
                action,
                source: Some(source),
            },
            CodecError::Unsupported { action } => Self::UnsupportedAction { action },
            CodecError::Encode { action, source } => Self::Encode { action, source },
        }
    }
}
