//! isodemo CLI -- run isolation scenarios against a MySQL database.

use core::time::Duration;

use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use isodemo_core::{Balance, Scenario, BASELINE_BALANCE};
use isodemo_drivers::config::{DATABASE_VAR, HOST_VAR, PORT_VAR, USER_VAR};
use isodemo_drivers::scenarios::ScenarioOptions;
use isodemo_drivers::{ConnectionConfig, DriverError};

#[derive(Debug, Parser)]
#[command(
    name = "isodemo",
    about = "Demonstrate transaction isolation anomalies against a live database",
    after_help = "The password is read from DB_PASSWORD only. A .env file in the \
                  working directory is loaded first."
)]
pub struct App {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl App {
    /// The command to execute. `run` is the default, and run options given
    /// before the subcommand are merged into it.
    ///
    /// # Errors
    ///
    /// Returns an argument conflict when run options precede `seed`.
    pub fn resolve_command(&mut self) -> Result<Command, clap::Error> {
        let top = core::mem::take(&mut self.run);
        match self.command.take() {
            None => Ok(Command::Run(top)),
            Some(Command::Run(args)) => Ok(Command::Run(top.merge(args))),
            Some(Command::Seed(_)) if top.is_set() => Err(Self::command().error(
                ErrorKind::ArgumentConflict,
                "run options cannot be combined with the seed subcommand",
            )),
            Some(command) => Ok(command),
        }
    }
}

/// Connection flags; each one falls back to its `DB_*` variable.
#[derive(Debug, Default, Args)]
pub struct ConnectionArgs {
    /// Database host [env: DB_HOST, default: localhost]
    #[arg(long, global = true)]
    pub host: Option<String>,
    /// Database port [env: DB_PORT, default: 3306]
    #[arg(long, global = true)]
    pub port: Option<u16>,
    /// Database user [env: DB_USER]
    #[arg(long, global = true)]
    pub user: Option<String>,
    /// Database name [env: DB_NAME, default: test_db]
    #[arg(long, global = true)]
    pub database: Option<String>,
}

impl ConnectionArgs {
    fn flag(&self, var: &str) -> Option<String> {
        match var {
            HOST_VAR => self.host.clone(),
            PORT_VAR => self.port.map(|port| port.to_string()),
            USER_VAR => self.user.clone(),
            DATABASE_VAR => self.database.clone(),
            _ => None,
        }
    }

    /// Combine flags with `env`, flags first.
    ///
    /// # Errors
    ///
    /// See [`ConnectionConfig::from_lookup`].
    pub fn resolve<E>(&self, env: E) -> Result<ConnectionConfig, DriverError>
    where
        E: Fn(&str) -> Option<String>,
    {
        ConnectionConfig::from_lookup(|var| self.flag(var).or_else(|| env(var)))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run isolation scenarios (the default)
    Run(RunArgs),
    /// Create the accounts table and reset Alice and Bob
    Seed(SeedArgs),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Args)]
pub struct RunArgs {
    /// Scenario to run; repeat for several. Runs all five when omitted
    #[arg(long = "scenario", value_enum)]
    pub scenarios: Vec<ScenarioName>,
    /// Exit with status 1 unless every scenario demonstrated its anomaly
    #[arg(long)]
    pub strict: bool,
    /// Print one JSON report per scenario after the transcript
    #[arg(long)]
    pub json: bool,
    /// Delay between the two conflicting lock requests of the deadlock
    /// scenario, in milliseconds [default: 200]
    #[arg(long)]
    pub lock_stagger_ms: Option<u64>,
}

impl RunArgs {
    /// Combine with options given after `run`; scenarios accumulate and the
    /// later stagger wins.
    #[must_use]
    pub fn merge(mut self, later: Self) -> Self {
        self.scenarios.extend(later.scenarios);
        self.strict |= later.strict;
        self.json |= later.json;
        self.lock_stagger_ms = later.lock_stagger_ms.or(self.lock_stagger_ms);
        self
    }

    /// Any run option was given.
    #[must_use]
    pub fn is_set(&self) -> bool {
        *self != Self::default()
    }

    /// Selected scenarios in run order.
    #[must_use]
    pub fn scenarios(&self) -> Vec<Scenario> {
        if self.scenarios.is_empty() {
            return Scenario::ALL.to_vec();
        }
        let picked: Vec<Scenario> = self.scenarios.iter().copied().map(Scenario::from).collect();
        Scenario::ALL
            .into_iter()
            .filter(|scenario| picked.contains(scenario))
            .collect()
    }

    #[must_use]
    pub fn options(&self) -> ScenarioOptions {
        let mut options = ScenarioOptions::default();
        if let Some(ms) = self.lock_stagger_ms {
            options.lock_stagger = Duration::from_millis(ms);
        }
        options
    }
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Balance given to both accounts
    #[arg(long, default_value_t = BASELINE_BALANCE)]
    pub baseline: Balance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioName {
    DirtyRead,
    CommittedRead,
    RepeatableRead,
    NonRepeatableRead,
    Deadlock,
}

impl From<ScenarioName> for Scenario {
    fn from(name: ScenarioName) -> Self {
        match name {
            ScenarioName::DirtyRead => Self::DirtyRead,
            ScenarioName::CommittedRead => Self::CommittedRead,
            ScenarioName::RepeatableRead => Self::RepeatableRead,
            ScenarioName::NonRepeatableRead => Self::NonRepeatableRead,
            ScenarioName::Deadlock => Self::Deadlock,
        }
    }
}
