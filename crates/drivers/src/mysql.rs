//! MySQL connections through `sqlx`.
//!
//! Transaction control statements go over the text protocol
//! ([`sqlx::raw_sql`]); statements touching `accounts` are prepared with
//! bound parameters.

use isodemo_core::{Balance, IsolationLevel};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use tracing::debug;

use crate::{ConnectionConfig, DbDriver, DbSession, DriverError};

const SELECT_BALANCE: &str = "SELECT CAST(balance AS SIGNED) FROM accounts WHERE name = ?";
const LOCK_BALANCE: &str = "SELECT CAST(balance AS SIGNED) FROM accounts WHERE name = ? FOR UPDATE";
const UPDATE_BALANCE: &str = "UPDATE accounts SET balance = ? WHERE name = ?";
const UPSERT_BALANCE: &str = "INSERT INTO accounts (name, balance) VALUES (?, ?) \
                              ON DUPLICATE KEY UPDATE balance = VALUES(balance)";
const CREATE_ACCOUNTS: &str = "CREATE TABLE IF NOT EXISTS accounts (\
                               name VARCHAR(64) NOT NULL PRIMARY KEY, \
                               balance BIGINT NOT NULL\
                               ) ENGINE = InnoDB";

/// Opens plain (unpooled) MySQL connections.
#[derive(Clone)]
pub struct MySqlDriver {
    options: MySqlConnectOptions,
}

impl MySqlDriver {
    #[must_use]
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            options: config.connect_options(),
        }
    }
}

impl DbDriver for MySqlDriver {
    type Session = MySqlSession;

    async fn connect(&self, label: &str) -> Result<MySqlSession, DriverError> {
        let conn = MySqlConnection::connect_with(&self.options)
            .await
            .map_err(DriverError::Connection)?;
        debug!(session = label, "connected");
        Ok(MySqlSession {
            label: label.to_owned(),
            conn,
            in_transaction: false,
        })
    }
}

/// One connection, driven by one transaction at a time.
pub struct MySqlSession {
    label: String,
    conn: MySqlConnection,
    in_transaction: bool,
}

impl MySqlSession {
    /// Create `accounts` if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Statement`] if the DDL fails.
    pub async fn ensure_accounts_table(&mut self) -> Result<(), DriverError> {
        self.control(CREATE_ACCOUNTS).await
    }

    /// Insert the account or overwrite its balance.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Statement`] if the statement fails.
    pub async fn upsert_balance(
        &mut self,
        name: &str,
        balance: Balance,
    ) -> Result<(), DriverError> {
        debug!(session = %self.label, name, balance, "upsert balance");
        sqlx::query(UPSERT_BALANCE)
            .bind(name)
            .bind(balance)
            .execute(&mut self.conn)
            .await
            .map_err(|source| DriverError::statement(UPSERT_BALANCE, source))?;
        Ok(())
    }

    async fn fetch_balance(
        &mut self,
        sql: &'static str,
        name: &str,
    ) -> Result<Balance, DriverError> {
        debug!(session = %self.label, sql, name, "fetch balance");
        sqlx::query_scalar::<_, Balance>(sql)
            .bind(name)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(|source| DriverError::statement(sql, source))?
            .ok_or_else(|| DriverError::MissingAccount(name.to_owned()))
    }

    async fn control(&mut self, sql: impl Into<String>) -> Result<(), DriverError> {
        let sql = sql.into();
        debug!(session = %self.label, %sql, "control");
        let result = sqlx::raw_sql(&sql).execute(&mut self.conn).await;
        result
            .map(drop)
            .map_err(|source| DriverError::statement(sql, source))
    }
}

impl DbSession for MySqlSession {
    fn label(&self) -> &str {
        &self.label
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn begin(&mut self, level: Option<IsolationLevel>) -> Result<(), DriverError> {
        if let Some(level) = level {
            self.control(level.set_transaction_sql()).await?;
        }
        self.control("START TRANSACTION").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.control("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.control("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn read_balance(&mut self, name: &str) -> Result<Balance, DriverError> {
        self.fetch_balance(SELECT_BALANCE, name).await
    }

    async fn lock_balance(&mut self, name: &str) -> Result<Balance, DriverError> {
        self.fetch_balance(LOCK_BALANCE, name).await
    }

    async fn set_balance(&mut self, name: &str, balance: Balance) -> Result<(), DriverError> {
        debug!(session = %self.label, name, balance, "update balance");
        sqlx::query(UPDATE_BALANCE)
            .bind(balance)
            .bind(name)
            .execute(&mut self.conn)
            .await
            .map_err(|source| DriverError::statement(UPDATE_BALANCE, source))?;
        Ok(())
    }

    async fn close(self) -> Result<(), DriverError> {
        let label = self.label;
        self.conn
            .close()
            .await
            .map_err(|source| DriverError::statement("close connection", source))?;
        debug!(session = %label, "closed");
        Ok(())
    }
}
