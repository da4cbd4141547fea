//! Optional fixture: create `accounts` and put both scenario rows at a known
//! balance. The scenarios themselves never call this.

use isodemo_core::{Balance, ALICE, BOB};
use tracing::info;

use crate::scoped::scoped;
use crate::{DbSession, DriverError, MySqlDriver, MySqlSession};

/// Create the `accounts` table if needed and set Alice and Bob to
/// `baseline`.
///
/// # Errors
///
/// Returns the first connection or statement error.
pub async fn seed_accounts(driver: &MySqlDriver, baseline: Balance) -> Result<(), DriverError> {
    scoped(driver, ["Seed"], async |[session]: &mut [MySqlSession; 1]| {
        session.ensure_accounts_table().await?;
        for name in [ALICE, BOB] {
            session.upsert_balance(name, baseline).await?;
        }
        info!(baseline, "seeded accounts");
        Ok(())
    })
    .await
    .outcome
}

/// Autocommit read of one account's balance.
///
/// # Errors
///
/// Returns the connection or statement error, or
/// [`DriverError::MissingAccount`].
pub async fn current_balance(driver: &MySqlDriver, name: &str) -> Result<Balance, DriverError> {
    scoped(driver, ["Inspect"], async |[session]: &mut [MySqlSession; 1]| {
        session.read_balance(name).await
    })
    .await
    .outcome
}
