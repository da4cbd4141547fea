//! In-memory sessions that log every statement and answer reads from a
//! script.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

use isodemo_core::{Balance, IsolationLevel, BASELINE_BALANCE};
use sqlx::error::{DatabaseError, ErrorKind};

use crate::{DbDriver, DbSession, DriverError};

/// How a scripted lock request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Aborted with SQLSTATE 40001.
    Deadlock,
    /// Aborted with an unrelated server error.
    Other,
}

/// State shared by a [`FakeDriver`] and every session it opened.
#[derive(Default)]
pub struct Script {
    /// `"<label>: <statement>"` in execution order.
    pub log: RefCell<Vec<String>>,
    /// Answers to reads and locking reads, per session label. An exhausted
    /// queue answers [`BASELINE_BALANCE`].
    pub reads: RefCell<HashMap<String, VecDeque<Balance>>>,
    /// `(label, account)` lock requests that fail, each at most once.
    pub faults: RefCell<Vec<(String, String, Fault)>>,
    pub connects: Cell<usize>,
    pub live: Cell<usize>,
    /// Labels of sessions whose connection was shut down.
    pub closed: RefCell<Vec<String>>,
}

impl Script {
    pub fn answer(&self, label: &str, balances: &[Balance]) {
        self.reads
            .borrow_mut()
            .entry(label.to_owned())
            .or_default()
            .extend(balances);
    }

    pub fn fail_lock(&self, label: &str, account: &str, fault: Fault) {
        self.faults
            .borrow_mut()
            .push((label.to_owned(), account.to_owned(), fault));
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    fn record(&self, label: &str, statement: impl fmt::Display) {
        self.log.borrow_mut().push(format!("{label}: {statement}"));
    }

    fn next_read(&self, label: &str) -> Balance {
        self.reads
            .borrow_mut()
            .get_mut(label)
            .and_then(VecDeque::pop_front)
            .unwrap_or(BASELINE_BALANCE)
    }

    fn take_fault(&self, label: &str, account: &str) -> Option<Fault> {
        let mut faults = self.faults.borrow_mut();
        let index = faults
            .iter()
            .position(|(l, a, _)| l == label && a == account)?;
        Some(faults.remove(index).2)
    }
}

#[derive(Default)]
pub struct FakeDriver {
    pub script: Rc<Script>,
    /// Index of the connection attempt to refuse.
    pub refuse: Option<usize>,
    pub fail_rollback: bool,
    pub fail_close: bool,
}

pub struct FakeSession {
    label: String,
    script: Rc<Script>,
    in_transaction: bool,
    fail_rollback: bool,
    fail_close: bool,
}

impl DbDriver for FakeDriver {
    type Session = FakeSession;

    async fn connect(&self, label: &str) -> Result<FakeSession, DriverError> {
        let index = self.script.connects.get();
        self.script.connects.set(index + 1);
        if self.refuse == Some(index) {
            return Err(DriverError::Connection(sqlx::Error::Protocol(
                "connection refused".into(),
            )));
        }
        self.script.live.set(self.script.live.get() + 1);
        Ok(FakeSession {
            label: label.to_owned(),
            script: Rc::clone(&self.script),
            in_transaction: false,
            fail_rollback: self.fail_rollback,
            fail_close: self.fail_close,
        })
    }
}

impl DbSession for FakeSession {
    fn label(&self) -> &str {
        &self.label
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn begin(&mut self, level: Option<IsolationLevel>) -> Result<(), DriverError> {
        if let Some(level) = level {
            self.script.record(&self.label, level.set_transaction_sql());
        }
        self.script.record(&self.label, "START TRANSACTION");
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.script.record(&self.label, "COMMIT");
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.script.record(&self.label, "ROLLBACK");
        if self.fail_rollback {
            return Err(DriverError::statement("ROLLBACK", sqlx::Error::WorkerCrashed));
        }
        self.in_transaction = false;
        Ok(())
    }

    async fn read_balance(&mut self, name: &str) -> Result<Balance, DriverError> {
        self.script.record(&self.label, format_args!("SELECT {name}"));
        Ok(self.script.next_read(&self.label))
    }

    async fn lock_balance(&mut self, name: &str) -> Result<Balance, DriverError> {
        self.script
            .record(&self.label, format_args!("SELECT {name} FOR UPDATE"));
        match self.script.take_fault(&self.label, name) {
            Some(Fault::Deadlock) => Err(DriverError::statement(
                "SELECT ... FOR UPDATE",
                sqlx::Error::Database(Box::new(FakeDatabaseError::deadlock())),
            )),
            Some(Fault::Other) => Err(DriverError::statement(
                "SELECT ... FOR UPDATE",
                sqlx::Error::Database(Box::new(FakeDatabaseError::other())),
            )),
            None => Ok(self.script.next_read(&self.label)),
        }
    }

    async fn set_balance(&mut self, name: &str, balance: Balance) -> Result<(), DriverError> {
        self.script
            .record(&self.label, format_args!("UPDATE {name} = {balance}"));
        Ok(())
    }

    async fn close(self) -> Result<(), DriverError> {
        self.script.record(&self.label, "close");
        self.script.live.set(self.script.live.get() - 1);
        self.script.closed.borrow_mut().push(self.label);
        if self.fail_close {
            return Err(DriverError::statement(
                "close connection",
                sqlx::Error::WorkerCrashed,
            ));
        }
        Ok(())
    }
}

/// Server error carrying only a message and a SQLSTATE.
#[derive(Debug)]
pub struct FakeDatabaseError {
    message: &'static str,
    sqlstate: &'static str,
}

impl FakeDatabaseError {
    pub const fn deadlock() -> Self {
        Self {
            message: "Deadlock found when trying to get lock; try restarting transaction",
            sqlstate: "40001",
        }
    }

    pub const fn other() -> Self {
        Self {
            message: "Query execution was interrupted",
            sqlstate: "70100",
        }
    }
}

impl fmt::Display for FakeDatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl StdError for FakeDatabaseError {}

impl DatabaseError for FakeDatabaseError {
    fn message(&self) -> &str {
        self.message
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.sqlstate))
    }

    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}
