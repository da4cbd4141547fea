//! Vocabulary for demonstrating transaction isolation anomalies.
//!
//! `isodemo_core` knows nothing about connections. It names the pieces a
//! demonstration is made of and judges what a database did:
//!
//! - [`IsolationLevel`] -- the four standard SQL isolation levels and their
//!   SQL spelling.
//! - [`Scenario`] -- the five scripted demonstrations, in the order they run:
//!   dirty read, committed read, repeatable read, non-repeatable read and
//!   deadlock.
//! - [`Observation`] -- the values a scenario fetched, and
//!   [`Observation::verdict()`] which decides whether the database exhibited
//!   the anomaly (or its absence) the scenario is meant to show.
//! - [`ScenarioReport`] -- one scenario run: its observation, any error and
//!   how many connections were opened and closed.
//! - [`transcript`] -- timestamped, human-readable narration.
//!
//! # Crate features
//!
//! - **`serde`** -- enables `Serialize`/`Deserialize` derives on the public
//!   types so reports can be emitted as JSON.

pub mod account;
pub mod isolation;
pub mod observation;
pub mod scenario;
pub mod transcript;

pub use account::{Balance, ALICE, BASELINE_BALANCE, BOB, WRITTEN_BALANCE};
pub use isolation::IsolationLevel;
pub use observation::{LockOutcome, Observation, ScenarioReport, Verdict};
pub use scenario::Scenario;
