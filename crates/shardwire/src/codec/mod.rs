//! Decoding and encoding of protocol lines.
//!
//! Decoding is two-phase: the `action` discriminant is probed first so an
//! unknown action is reported as unsupported rather than malformed, then the
//! whole line is decoded into the matching [`Action`] variant.

use serde::Deserialize;
use thiserror::Error;

use crate::protocol::{Action, ActionKind};

#[derive(Deserialize)]
struct Discriminant {
    action: String,
}

/// Errors raised while translating between lines and actions.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The line is not a valid envelope or its payload does not match the
    /// declared action.
    #[error("malformed {} line", .action.as_deref().unwrap_or("protocol"))]
    Malformed {
        /// Discriminant, when it could be read.
        action: Option<String>,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The discriminant names an action this protocol revision lacks.
    #[error("unsupported action '{action}'")]
    Unsupported {
        /// Discriminant as received.
        action: String,
    },

    /// An outbound action could not be serialised.
    #[error("failed to encode {action} action")]
    Encode {
        /// Kind of the action being encoded.
        action: ActionKind,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Decodes one protocol line into a typed action.
///
/// # Errors
///
/// Returns [`CodecError::Unsupported`] for an unknown discriminant and
/// [`CodecError::Malformed`] when the envelope or payload fails to parse.
///
/// # Example
///
/// ```
/// use shardwire::codec::decode;
/// use shardwire::protocol::ActionKind;
///
/// let action = decode(r#"{"action":"leaseLost"}"#).expect("valid line");
/// assert_eq!(action.kind(), ActionKind::LeaseLost);
/// ```
pub fn decode(line: &str) -> Result<Action, CodecError> {
    let Discriminant { action } = serde_json::from_str(line)
        .map_err(|source| CodecError::Malformed {
            action: None,
            source,
        })?;

    if action.parse::<ActionKind>().is_err() {
        return Err(CodecError::Unsupported { action });
    }

    serde_json::from_str(line).map_err(|source| CodecError::Malformed {
        action: Some(action),
        source,
    })
}

/// Encodes an action as a single line without the trailing newline.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialisation fails.
pub fn encode(action: &Action) -> Result<String, CodecError> {
    serde_json::to_string(action).map_err(|source| CodecError::Encode {
        action: action.kind(),
        source,
    })
}
