//! Where to connect, taken from the environment.
//!
//! There are no fallback credentials: user and password must always be
//! supplied.

use core::fmt;

use sqlx::mysql::MySqlConnectOptions;

use crate::DriverError;

pub const HOST_VAR: &str = "DB_HOST";
pub const PORT_VAR: &str = "DB_PORT";
pub const USER_VAR: &str = "DB_USER";
pub const PASSWORD_VAR: &str = "DB_PASSWORD";
pub const DATABASE_VAR: &str = "DB_NAME";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_DATABASE: &str = "test_db";

/// Parameters for opening a connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`ConnectionConfig::from_lookup`].
    pub fn from_env() -> Result<Self, DriverError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from `lookup`, which maps a variable name such
    /// as [`HOST_VAR`] to its value.
    ///
    /// Host, port and database fall back to [`DEFAULT_HOST`],
    /// [`DEFAULT_PORT`] and [`DEFAULT_DATABASE`] when unset or empty. User
    /// and password have no fallback; an empty password is accepted when the
    /// variable is set.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MissingVar`] when user or password is unset,
    /// and [`DriverError::InvalidVar`] when the port is not a valid `u16`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DriverError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match non_empty(PORT_VAR) {
            None => DEFAULT_PORT,
            Some(value) => value
                .trim()
                .parse()
                .map_err(|err: core::num::ParseIntError| DriverError::InvalidVar {
                    var: PORT_VAR,
                    value: value.clone(),
                    reason: err.to_string(),
                })?,
        };

        Ok(Self {
            host: non_empty(HOST_VAR).unwrap_or_else(|| DEFAULT_HOST.to_owned()),
            port,
            user: non_empty(USER_VAR).ok_or(DriverError::MissingVar(USER_VAR))?,
            password: lookup(PASSWORD_VAR).ok_or(DriverError::MissingVar(PASSWORD_VAR))?,
            database: non_empty(DATABASE_VAR).unwrap_or_else(|| DEFAULT_DATABASE.to_owned()),
        })
    }

    #[must_use]
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}
