use std::borrow::Cow;

use sqlx::error::DatabaseError;
use sqlx::mysql::MySqlDatabaseError;

/// `ER_LOCK_DEADLOCK`: the server aborted this transaction to break a cycle.
pub const ER_LOCK_DEADLOCK: u16 = 1213;

/// `ER_LOCK_WAIT_TIMEOUT`: a lock request waited longer than
/// `innodb_lock_wait_timeout`.
pub const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;

const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

/// Anything that can go wrong between this process and the database.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// A required configuration variable is not set.
    #[error("{0} is not set")]
    MissingVar(&'static str),
    /// A configuration variable is set to something unusable.
    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidVar {
        var: &'static str,
        value: String,
        reason: String,
    },
    /// Opening a connection failed.
    #[error("could not connect: {0}")]
    Connection(#[source] sqlx::Error),
    /// A statement was rejected or aborted by the server.
    #[error("`{statement}` failed: {source}")]
    Statement {
        statement: Cow<'static, str>,
        #[source]
        source: sqlx::Error,
    },
    /// The `accounts` table has no row with this name.
    #[error("no account named {0:?}")]
    MissingAccount(String),
    /// The driver handed out fewer sessions than were asked for.
    #[error("opened {opened} of {expected} sessions")]
    SessionCount { expected: usize, opened: usize },
}

impl DriverError {
    pub(crate) fn statement(statement: impl Into<Cow<'static, str>>, source: sqlx::Error) -> Self {
        Self::Statement {
            statement: statement.into(),
            source,
        }
    }

    fn database_error(&self) -> Option<&(dyn DatabaseError + 'static)> {
        match self {
            Self::Connection(source) | Self::Statement { source, .. } => {
                source.as_database_error()
            }
            Self::MissingVar(_)
            | Self::InvalidVar { .. }
            | Self::MissingAccount(_)
            | Self::SessionCount { .. } => None,
        }
    }

    /// MySQL error number reported by the server, if any.
    #[must_use]
    pub fn mysql_error_number(&self) -> Option<u16> {
        self.database_error()?
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(MySqlDatabaseError::number)
    }

    /// The server aborted the transaction to break a deadlock.
    #[must_use]
    pub fn is_deadlock(&self) -> bool {
        if let Some(number) = self.mysql_error_number() {
            return number == ER_LOCK_DEADLOCK;
        }
        self.database_error()
            .and_then(|error| error.code())
            .is_some_and(|code| code == SQLSTATE_SERIALIZATION_FAILURE)
    }

    /// A lock request gave up waiting.
    #[must_use]
    pub fn is_lock_wait_timeout(&self) -> bool {
        self.mysql_error_number() == Some(ER_LOCK_WAIT_TIMEOUT)
    }
}
