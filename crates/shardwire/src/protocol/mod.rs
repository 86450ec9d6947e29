//! Wire types for the supervisor line protocol.
//!
//! Every message is a single JSON object on its own line. The `action` field
//! names the message kind and sits inline next to the payload fields, so the
//! same framing carries both directions of the exchange. Binary record
//! payloads travel base64 encoded and are only decoded on request.

use std::time::{Duration, SystemTime};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Discriminant carried in the `action` field of every message.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ActionKind {
    /// Shard assignment, always the first inbound message.
    Initialize,
    /// A batch of records to process.
    ProcessRecords,
    /// Legacy terminal notification qualified by a reason.
    Shutdown,
    /// Advisory notice that the worker is shutting down.
    ShutdownRequested,
    /// The lease on the shard was revoked.
    LeaseLost,
    /// The shard has been fully consumed.
    ShardEnded,
    /// Checkpoint request (outbound) or acknowledgement (inbound).
    Checkpoint,
    /// Acknowledgement that an inbound action was handled.
    Status,
}

/// A decoded protocol message.
///
/// # Example
///
/// ```
/// use shardwire::protocol::{Action, ActionKind, CheckpointAction};
///
/// let action = Action::Checkpoint(CheckpointAction::at("100", 0));
/// assert_eq!(action.kind(), ActionKind::Checkpoint);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    /// See [`InitializeAction`].
    Initialize(InitializeAction),
    /// See [`ProcessRecordsAction`].
    ProcessRecords(ProcessRecordsAction),
    /// See [`ShutdownAction`].
    Shutdown(ShutdownAction),
    /// See [`ShutdownRequestedAction`].
    ShutdownRequested(ShutdownRequestedAction),
    /// See [`LeaseLostAction`].
    LeaseLost(LeaseLostAction),
    /// See [`ShardEndedAction`].
    ShardEnded(ShardEndedAction),
    /// See [`CheckpointAction`].
    Checkpoint(CheckpointAction),
    /// See [`StatusAction`].
    Status(StatusAction),
}

impl Action {
    /// Returns the discriminant of this action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Initialize(_) => ActionKind::Initialize,
            Self::ProcessRecords(_) => ActionKind::ProcessRecords,
            Self::Shutdown(_) => ActionKind::Shutdown,
            Self::ShutdownRequested(_) => ActionKind::ShutdownRequested,
            Self::LeaseLost(_) => ActionKind::LeaseLost,
            Self::ShardEnded(_) => ActionKind::ShardEnded,
            Self::Checkpoint(_) => ActionKind::Checkpoint,
            Self::Status(_) => ActionKind::Status,
        }
    }
}

/// Assigns a shard to this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeAction {
    shard_id: String,
    #[serde(default)]
    sequence_number: Option<String>,
    #[serde(default)]
    sub_sequence_number: Option<u64>,
}

impl InitializeAction {
    /// Creates an initialize action for `shard_id`.
    #[must_use]
    pub fn new(
        shard_id: impl Into<String>,
        sequence_number: Option<String>,
        sub_sequence_number: Option<u64>,
    ) -> Self {
        Self {
            shard_id: shard_id.into(),
            sequence_number,
            sub_sequence_number,
        }
    }

    /// Returns the shard identifier.
    #[must_use]
    pub const fn shard_id(&self) -> &str {
        self.shard_id.as_str()
    }

    /// Returns the last checkpointed sequence number, if any.
    ///
    /// An empty string on the wire is reported as `None`.
    #[must_use]
    pub fn sequence_number(&self) -> Option<&str> {
        self.sequence_number
            .as_deref()
            .filter(|sequence| !sequence.is_empty())
    }

    /// Returns the last checkpointed sub-sequence number, if any.
    #[must_use]
    pub const fn sub_sequence_number(&self) -> Option<u64> {
        self.sub_sequence_number
    }
}

/// A batch of records delivered for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecordsAction {
    #[serde(default, deserialize_with = "null_as_default")]
    records: Vec<Record>,
    #[serde(default)]
    millis_behind_latest: Option<u64>,
}

impl ProcessRecordsAction {
    /// Creates a batch from `records`.
    #[must_use]
    pub const fn new(records: Vec<Record>, millis_behind_latest: u64) -> Self {
        Self {
            records,
            millis_behind_latest: Some(millis_behind_latest),
        }
    }

    /// Returns the records in delivery order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns the estimated lag behind the head of the stream.
    ///
    /// Supervisors that omit the estimate report zero.
    #[must_use]
    pub fn millis_behind_latest(&self) -> u64 {
        self.millis_behind_latest.unwrap_or_default()
    }
}

/// One record from the shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    data: String,
    partition_key: String,
    sequence_number: String,
    #[serde(default)]
    sub_sequence_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    approximate_arrival_timestamp: Option<ArrivalTimestamp>,
}

impl Record {
    /// Creates a record, base64 encoding `payload`.
    #[must_use]
    pub fn new(
        payload: &[u8],
        partition_key: impl Into<String>,
        sequence_number: impl Into<String>,
        sub_sequence_number: u64,
    ) -> Self {
        Self {
            data: STANDARD.encode(payload),
            partition_key: partition_key.into(),
            sequence_number: sequence_number.into(),
            sub_sequence_number,
            approximate_arrival_timestamp: None,
        }
    }

    /// Attaches an arrival timestamp.
    #[must_use]
    pub const fn with_arrival(mut self, timestamp: ArrivalTimestamp) -> Self {
        self.approximate_arrival_timestamp = Some(timestamp);
        self
    }

    /// Returns the payload exactly as received (base64 text).
    #[must_use]
    pub const fn encoded_data(&self) -> &str {
        self.data.as_str()
    }

    /// Decodes the base64 payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid standard base64.
    pub fn decode_data(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.data.as_bytes())
    }

    /// Returns the partition key.
    #[must_use]
    pub const fn partition_key(&self) -> &str {
        self.partition_key.as_str()
    }

    /// Returns the sequence number.
    #[must_use]
    pub const fn sequence_number(&self) -> &str {
        self.sequence_number.as_str()
    }

    /// Returns the sub-sequence number.
    #[must_use]
    pub const fn sub_sequence_number(&self) -> u64 {
        self.sub_sequence_number
    }

    /// Returns the approximate arrival time, when the supervisor sent one.
    #[must_use]
    pub const fn arrival(&self) -> Option<ArrivalTimestamp> {
        self.approximate_arrival_timestamp
    }
}

/// Approximate time a record reached the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalTimestamp {
    epoch_second: u64,
    #[serde(default)]
    nano: u32,
}

impl ArrivalTimestamp {
    /// Creates a timestamp from its second and nanosecond components.
    #[must_use]
    pub const fn new(epoch_second: u64, nano: u32) -> Self {
        Self { epoch_second, nano }
    }

    /// Seconds since the Unix epoch.
    #[must_use]
    pub const fn epoch_second(self) -> u64 {
        self.epoch_second
    }

    /// Nanosecond component.
    #[must_use]
    pub const fn nano(self) -> u32 {
        self.nano
    }

    /// Converts to a [`SystemTime`], returning `None` on overflow.
    #[must_use]
    pub fn to_system_time(self) -> Option<SystemTime> {
        SystemTime::UNIX_EPOCH
            .checked_add(Duration::from_secs(self.epoch_second))?
            .checked_add(Duration::from_nanos(u64::from(self.nano)))
    }
}

/// Legacy terminal notification.
///
/// Superseded by [`LeaseLostAction`] and [`ShardEndedAction`]; the reason
/// selects which of the two it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownAction {
    reason: String,
}

impl ShutdownAction {
    /// Creates a shutdown action with a raw reason string.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the reason exactly as received.
    #[must_use]
    pub const fn reason(&self) -> &str {
        self.reason.as_str()
    }

    /// Parses the reason into a [`ShutdownReason`].
    ///
    /// # Errors
    ///
    /// Returns an error when the reason is not one the protocol defines.
    pub fn parsed_reason(&self) -> Result<ShutdownReason, strum::ParseError> {
        self.reason.parse()
    }
}

/// Reasons carried by a legacy [`ShutdownAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ShutdownReason {
    /// The shard is exhausted; equivalent to `shardEnded`.
    Terminate,
    /// The lease was lost; equivalent to `leaseLost`.
    Zombie,
}

/// Advisory notice that the worker is shutting down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownRequestedAction {}

/// The lease on the shard was revoked; checkpointing is no longer possible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseLostAction {}

/// The shard is exhausted; a final checkpoint is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEndedAction {}

/// Checkpoint request or its acknowledgement.
///
/// Requests carry a position (both fields `null` means "the most recently
/// delivered record"). Acknowledgements carry an optional supervisor error.
/// All three fields are always serialised, as `null` when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointAction {
    #[serde(default)]
    sequence_number: Option<String>,
    #[serde(default)]
    sub_sequence_number: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

impl CheckpointAction {
    /// Request a checkpoint at a specific position.
    #[must_use]
    pub fn at(sequence_number: impl Into<String>, sub_sequence_number: u64) -> Self {
        Self {
            sequence_number: Some(sequence_number.into()),
            sub_sequence_number: Some(sub_sequence_number),
            error: None,
        }
    }

    /// Request a checkpoint at the most recently delivered record.
    #[must_use]
    pub const fn latest() -> Self {
        Self {
            sequence_number: None,
            sub_sequence_number: None,
            error: None,
        }
    }

    /// Acknowledgement reporting a supervisor-side failure.
    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::latest()
        }
    }

    /// Returns the requested sequence number.
    #[must_use]
    pub fn sequence_number(&self) -> Option<&str> {
        self.sequence_number.as_deref()
    }

    /// Returns the requested sub-sequence number.
    #[must_use]
    pub const fn sub_sequence_number(&self) -> Option<u64> {
        self.sub_sequence_number
    }

    /// Returns the supervisor error carried by an acknowledgement.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Consumes the action, yielding the supervisor error if present.
    #[must_use]
    pub fn into_error(self) -> Option<String> {
        self.error
    }
}

/// Acknowledgement that an inbound action has been fully handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAction {
    response_for: ActionKind,
}

impl StatusAction {
    /// Creates a status acknowledging `response_for`.
    #[must_use]
    pub const fn new(response_for: ActionKind) -> Self {
        Self { response_for }
    }

    /// Returns the kind of the action this status answers.
    #[must_use]
    pub const fn response_for(self) -> ActionKind {
        self.response_for
    }
}

/// Treats an explicit `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
