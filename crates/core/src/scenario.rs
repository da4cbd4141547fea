use derive_more::Display;

use crate::IsolationLevel;

/// The scripted demonstrations, in the order a full run executes them.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
pub enum Scenario {
    /// A READ UNCOMMITTED reader observes a write that is later rolled back.
    #[display("dirty-read")]
    DirtyRead,
    /// A READ COMMITTED reader does not observe the same uncommitted write.
    #[display("committed-read")]
    CommittedRead,
    /// A REPEATABLE READ transaction reads a row twice around a committed
    /// update and sees the same value both times.
    #[display("repeatable-read")]
    RepeatableRead,
    /// A READ COMMITTED transaction reads a row twice around a committed
    /// update and sees the update the second time.
    #[display("non-repeatable-read")]
    NonRepeatableRead,
    /// Two transactions lock rows in opposite order until the server aborts
    /// one of them.
    #[display("deadlock")]
    Deadlock,
}

impl Scenario {
    pub const ALL: [Self; 5] = [
        Self::DirtyRead,
        Self::CommittedRead,
        Self::RepeatableRead,
        Self::NonRepeatableRead,
        Self::Deadlock,
    ];

    /// Transcript heading printed before the scenario runs.
    #[must_use]
    pub const fn heading(self) -> &'static str {
        match self {
            Self::DirtyRead => "Demonstrating Dirty Read with READ UNCOMMITTED",
            Self::CommittedRead => "Demonstrating No Dirty Read with READ COMMITTED",
            Self::RepeatableRead => "Demonstrating REPEATABLE READ",
            Self::NonRepeatableRead => "Demonstrating NON-REPEATABLE READ",
            Self::Deadlock => "Demonstrating Deadlock",
        }
    }

    /// Number of connections the scenario opens.
    #[must_use]
    pub const fn connections(self) -> usize {
        match self {
            Self::RepeatableRead | Self::NonRepeatableRead => 3,
            Self::DirtyRead | Self::CommittedRead | Self::Deadlock => 2,
        }
    }

    /// Isolation level of the transaction whose reads the scenario judges.
    ///
    /// `None` for the deadlock scenario, which runs at the server default.
    #[must_use]
    pub const fn observer_level(self) -> Option<IsolationLevel> {
        match self {
            Self::DirtyRead => Some(IsolationLevel::ReadUncommitted),
            Self::CommittedRead | Self::NonRepeatableRead => Some(IsolationLevel::ReadCommitted),
            Self::RepeatableRead => Some(IsolationLevel::RepeatableRead),
            Self::Deadlock => None,
        }
    }
}
