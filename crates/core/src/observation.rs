//! What a scenario saw, and whether that is what the isolation level
//! promises.

use derive_more::Display;

use crate::{Balance, IsolationLevel, Scenario};

/// Result of one lock request in the deadlock scenario.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum LockOutcome {
    /// The lock was granted (possibly after the other side was aborted).
    #[display("acquired")]
    Acquired,
    /// The server picked this transaction as the deadlock victim.
    #[display("deadlock victim")]
    DeadlockVictim,
    /// The request failed for a reason other than a deadlock.
    #[display("failed: {_0}")]
    Failed(String),
}

/// Values fetched by a scenario.
///
/// `written` is always the balance the concurrent transaction stored.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    DirtyRead {
        before: Balance,
        observed: Balance,
        written: Balance,
    },
    CommittedRead {
        before: Balance,
        observed: Balance,
        written: Balance,
    },
    RepeatableRead {
        first: Balance,
        second: Balance,
        written: Balance,
    },
    NonRepeatableRead {
        first: Balance,
        second: Balance,
        written: Balance,
    },
    Deadlock {
        first: LockOutcome,
        second: LockOutcome,
    },
}

/// Judgement of an [`Observation`].
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Verdict {
    /// The database behaved as the isolation level predicts.
    #[display("demonstrated")]
    Demonstrated,
    /// The starting data cannot tell the expected and unexpected outcomes
    /// apart.
    #[display("inconclusive: {_0}")]
    Inconclusive(String),
    /// The database behaved differently from the isolation level's
    /// prediction.
    #[display("contradicted: {_0}")]
    Contradicted(String),
}

impl Verdict {
    #[must_use]
    pub const fn is_demonstrated(&self) -> bool {
        matches!(self, Self::Demonstrated)
    }
}

impl Observation {
    #[must_use]
    pub const fn scenario(&self) -> Scenario {
        match self {
            Self::DirtyRead { .. } => Scenario::DirtyRead,
            Self::CommittedRead { .. } => Scenario::CommittedRead,
            Self::RepeatableRead { .. } => Scenario::RepeatableRead,
            Self::NonRepeatableRead { .. } => Scenario::NonRepeatableRead,
            Self::Deadlock { .. } => Scenario::Deadlock,
        }
    }

    /// Decide whether the fetched values show what the scenario is meant to
    /// show.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::DirtyRead {
                before,
                observed,
                written,
            } => judge_uncommitted_write(
                IsolationLevel::ReadUncommitted,
                *before,
                *observed,
                *written,
            ),
            Self::CommittedRead {
                before,
                observed,
                written,
            } => judge_uncommitted_write(
                IsolationLevel::ReadCommitted,
                *before,
                *observed,
                *written,
            ),
            Self::RepeatableRead {
                first,
                second,
                written,
            } => judge_reread(IsolationLevel::RepeatableRead, *first, *second, *written),
            Self::NonRepeatableRead {
                first,
                second,
                written,
            } => judge_reread(IsolationLevel::ReadCommitted, *first, *second, *written),
            Self::Deadlock { first, second } => judge_deadlock(first, second),
        }
    }
}

/// A reader at `level` reads a row another transaction has written but not
/// committed.
fn judge_uncommitted_write(
    level: IsolationLevel,
    before: Balance,
    observed: Balance,
    written: Balance,
) -> Verdict {
    if before == written {
        return Verdict::Inconclusive(format!(
            "the row already held {written} before the uncommitted update"
        ));
    }
    if level.allows_dirty_reads() {
        if observed == written {
            Verdict::Demonstrated
        } else {
            Verdict::Contradicted(format!(
                "{level} reader saw {observed}, expected the uncommitted {written}"
            ))
        }
    } else if observed == before {
        Verdict::Demonstrated
    } else {
        Verdict::Contradicted(format!(
            "{level} reader saw {observed}, expected the committed {before}"
        ))
    }
}

/// A transaction at `level` reads a row twice; another transaction commits
/// `written` in between.
fn judge_reread(
    level: IsolationLevel,
    first: Balance,
    second: Balance,
    written: Balance,
) -> Verdict {
    if first == written {
        return Verdict::Inconclusive(format!(
            "the first read already returned {written}, the value committed in between"
        ));
    }
    if level.allows_non_repeatable_reads() {
        if second == written {
            Verdict::Demonstrated
        } else {
            Verdict::Contradicted(format!(
                "{level} second read returned {second}, expected the committed {written}"
            ))
        }
    } else if first == second {
        Verdict::Demonstrated
    } else {
        Verdict::Contradicted(format!(
            "{level} reads differ: {first} then {second}"
        ))
    }
}

fn judge_deadlock(first: &LockOutcome, second: &LockOutcome) -> Verdict {
    match (first, second) {
        (LockOutcome::Acquired, LockOutcome::DeadlockVictim)
        | (LockOutcome::DeadlockVictim, LockOutcome::Acquired) => Verdict::Demonstrated,
        (LockOutcome::Failed(message), _) | (_, LockOutcome::Failed(message)) => {
            Verdict::Contradicted(format!("lock request failed: {message}"))
        }
        (LockOutcome::Acquired, LockOutcome::Acquired) => {
            Verdict::Contradicted("both lock requests were granted".into())
        }
        (LockOutcome::DeadlockVictim, LockOutcome::DeadlockVictim) => {
            Verdict::Contradicted("both transactions were aborted".into())
        }
    }
}

/// Outcome of running one scenario.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    /// Present when the script ran to its last statement.
    pub observation: Option<Observation>,
    /// Message of the database error that ended the script early.
    pub error: Option<String>,
    /// Connections the scenario opened.
    pub opened: usize,
    /// Connections the scenario closed again.
    pub closed: usize,
}

impl ScenarioReport {
    #[must_use]
    pub fn verdict(&self) -> Option<Verdict> {
        self.observation.as_ref().map(Observation::verdict)
    }

    /// Every connection that was opened has been closed.
    #[must_use]
    pub const fn all_released(&self) -> bool {
        self.opened == self.closed
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.error.is_none()
            && self.all_released()
            && self.verdict().is_some_and(|v| v.is_demonstrated())
    }

    /// One-line status for the end-of-run summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let status = if let Some(error) = &self.error {
            format!("error: {error}")
        } else if let Some(verdict) = self.verdict() {
            verdict.to_string()
        } else {
            "no observation".to_owned()
        };

        let name = self.scenario.to_string();
        if self.all_released() {
            format!("{name:<20} {status}")
        } else {
            format!(
                "{name:<20} {status} ({} of {} connections left open)",
                self.opened.saturating_sub(self.closed),
                self.opened
            )
        }
    }
}
