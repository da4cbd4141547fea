//! Database sessions and the scripted isolation scenarios that run on them.
//!
//! A [`DbDriver`] opens one labelled session per simulated transaction. The
//! scenarios in [`scenarios`] open two or three sessions through
//! [`scoped::scoped`], interleave fixed statements on them from a single
//! thread, and hand back a [`ScenarioReport`](isodemo_core::ScenarioReport).
//! All isolation, locking and deadlock detection happens in the database
//! server.

use core::future::Future;

use isodemo_core::{Balance, IsolationLevel};
use tracing::warn;

pub mod config;
pub mod error;
#[cfg(test)]
mod fake;
pub mod mysql;
pub mod scenarios;
pub mod scoped;
pub mod seed;

pub use config::ConnectionConfig;
pub use error::DriverError;
pub use mysql::{MySqlDriver, MySqlSession};

/// Opens sessions against one database.
pub trait DbDriver {
    /// A single connection, used by one transaction at a time.
    type Session: DbSession;

    /// Open a new connection. `label` names the transaction that will use it
    /// in logs and the transcript.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Connection`] if the server is unreachable,
    /// rejects the credentials or does not know the database.
    fn connect(&self, label: &str) -> impl Future<Output = Result<Self::Session, DriverError>>;
}

/// A connection opened by a [`DbDriver`], carrying at most one transaction.
pub trait DbSession: Sized {
    fn label(&self) -> &str;

    /// Whether a transaction is open on this connection.
    fn in_transaction(&self) -> bool;

    /// Start a transaction. With `None` the server's default isolation level
    /// applies.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Statement`] if the server rejects either
    /// statement.
    fn begin(
        &mut self,
        level: Option<IsolationLevel>,
    ) -> impl Future<Output = Result<(), DriverError>>;

    /// # Errors
    ///
    /// Returns [`DriverError::Statement`] if the commit fails.
    fn commit(&mut self) -> impl Future<Output = Result<(), DriverError>>;

    /// # Errors
    ///
    /// Returns [`DriverError::Statement`] if the rollback fails.
    fn rollback(&mut self) -> impl Future<Output = Result<(), DriverError>>;

    /// Plain read of an account's balance.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MissingAccount`] if there is no such row.
    fn read_balance(&mut self, name: &str) -> impl Future<Output = Result<Balance, DriverError>>;

    /// Locking read (`FOR UPDATE`). Blocks inside the server while another
    /// transaction holds the row.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Statement`] when the server aborts the request,
    /// for instance as a deadlock victim.
    fn lock_balance(&mut self, name: &str) -> impl Future<Output = Result<Balance, DriverError>>;

    /// # Errors
    ///
    /// Returns [`DriverError::Statement`] if the update fails.
    fn set_balance(
        &mut self,
        name: &str,
        balance: Balance,
    ) -> impl Future<Output = Result<(), DriverError>>;

    /// Close the connection without touching an open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Statement`] if the connection could not be
    /// shut down cleanly.
    fn close(self) -> impl Future<Output = Result<(), DriverError>>;

    /// Roll back any open transaction, then close the connection.
    ///
    /// A failed rollback is only logged; the result is that of [`close`], and
    /// the server drops the transaction with the connection.
    ///
    /// # Errors
    ///
    /// Returns the error raised while closing.
    ///
    /// [`close`]: DbSession::close
    fn release(mut self) -> impl Future<Output = Result<(), DriverError>> {
        async move {
            if self.in_transaction() {
                if let Err(err) = self.rollback().await {
                    warn!(session = self.label(), error = %err, "rollback before close failed");
                }
            }
            self.close().await
        }
    }
}
