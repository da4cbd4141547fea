//! Rows of the `accounts` table the scenarios touch.

/// Account balance as fetched from the database.
///
/// Balances are always read through `CAST(balance AS SIGNED)`, so integral
/// `INT`, `BIGINT` and `DECIMAL` columns all decode to this type.
pub type Balance = i64;

/// The account every isolation scenario reads and writes.
pub const ALICE: &str = "Alice";

/// Second account, locked by the deadlock scenario.
pub const BOB: &str = "Bob";

/// Balance restored after the repeatable and non-repeatable read scenarios,
/// so repeated runs start from the same state.
pub const BASELINE_BALANCE: Balance = 1000;

/// Balance written by the concurrent transaction in every isolation scenario.
pub const WRITTEN_BALANCE: Balance = 9999;
