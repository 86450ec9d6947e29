use strum::Display;

use crate::protocol::ActionKind;

/// Position of the dispatch loop in the shard lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum LifecycleState {
    /// Waiting for `initialize`.
    #[default]
    #[strum(to_string = "uninitialized")]
    Uninitialized,
    /// Accepting record batches.
    #[strum(to_string = "active")]
    Active,
    /// A shutdown was requested; records and a terminal action may follow.
    #[strum(to_string = "shutdown requested")]
    ShutdownRequested,
    /// A terminal action was handled; only end of input is valid.
    #[strum(to_string = "terminated")]
    Terminated,
}

impl LifecycleState {
    /// Returns the state after handling `action`, or `None` if the action is
    /// not valid in this state.
    ///
    /// `initialize` must come first and only once. `checkpoint` and `status`
    /// are never valid outside a checkpoint handshake.
    #[must_use]
    pub const fn transition(self, action: ActionKind) -> Option<Self> {
        match (self, action) {
            (Self::Uninitialized, ActionKind::Initialize) => Some(Self::Active),
            (Self::Active | Self::ShutdownRequested, ActionKind::ProcessRecords) => Some(self),
            (Self::Active | Self::ShutdownRequested, ActionKind::ShutdownRequested) => {
                Some(Self::ShutdownRequested)
            }
            (
                Self::Active | Self::ShutdownRequested,
                ActionKind::LeaseLost | ActionKind::ShardEnded | ActionKind::Shutdown,
            ) => Some(Self::Terminated),
            _ => None,
        }
    }

    /// Returns `true` once a terminal action has been handled.
    #[must_use]
    pub const fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated)
    }
}
