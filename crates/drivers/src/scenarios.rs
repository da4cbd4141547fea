//! The five scripted demonstrations.
//!
//! Every script interleaves statements on its sessions from one thread, in a
//! fixed order; the server decides what each transaction sees. Failures end a
//! script early, are printed as `Error: ...` and recorded in the report. They
//! never stop the next scenario.

use core::time::Duration;

use isodemo_core::transcript::{stamped, Narrator};
use isodemo_core::{
    Balance, IsolationLevel, LockOutcome, Observation, Scenario, ScenarioReport, ALICE,
    BASELINE_BALANCE, BOB, WRITTEN_BALANCE,
};
use tracing::{info, warn};

use crate::scoped::{scoped, ScopedRun};
use crate::{DbDriver, DbSession, DriverError};

/// Knobs shared by all scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioOptions {
    /// Balance the concurrent writer stores.
    pub written: Balance,
    /// Balance restored at the end of the re-read scenarios.
    pub baseline: Balance,
    /// How long the second lock request of the deadlock scenario trails the
    /// first, so the first is already waiting inside the server.
    pub lock_stagger: Duration,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            written: WRITTEN_BALANCE,
            baseline: BASELINE_BALANCE,
            lock_stagger: Duration::from_millis(200),
        }
    }
}

/// Run `scenarios` in order, separating their transcripts with a blank line.
pub async fn run_all<D: DbDriver>(
    driver: &D,
    scenarios: &[Scenario],
    options: &ScenarioOptions,
    narrator: &dyn Narrator,
) -> Vec<ScenarioReport> {
    let mut reports = Vec::with_capacity(scenarios.len());
    for (i, scenario) in scenarios.iter().enumerate() {
        if i > 0 {
            narrator.say("");
        }
        reports.push(run_scenario(driver, *scenario, options, narrator).await);
    }
    reports
}

/// Run one scenario and report what happened.
pub async fn run_scenario<D: DbDriver>(
    driver: &D,
    scenario: Scenario,
    options: &ScenarioOptions,
    narrator: &dyn Narrator,
) -> ScenarioReport {
    info!(%scenario, "running scenario");
    narrator.say(scenario.heading());

    let run = match scenario {
        Scenario::DirtyRead | Scenario::CommittedRead => {
            uncommitted_write(driver, scenario, options, narrator).await
        }
        Scenario::RepeatableRead | Scenario::NonRepeatableRead => {
            reread(driver, scenario, options, narrator).await
        }
        Scenario::Deadlock => deadlock(driver, options, narrator).await,
    };

    let ScopedRun {
        outcome,
        opened,
        closed,
    } = run;
    let (observation, error) = match outcome {
        Ok(observation) => {
            debug_assert_eq!(observation.scenario(), scenario);
            debug_assert_eq!(opened, scenario.connections());
            info!(%scenario, verdict = %observation.verdict(), "scenario finished");
            (Some(observation), None)
        }
        Err(err) => {
            warn!(%scenario, error = %err, "scenario failed");
            narrator.say(&format!("Error: {err}"));
            (None, Some(err.to_string()))
        }
    };
    if opened != closed {
        warn!(%scenario, opened, closed, "connections left open");
    }

    ScenarioReport {
        scenario,
        observation,
        error,
        opened,
        closed,
    }
}

/// Transaction 1 writes Alice without committing; Transaction 2 reads her at
/// the scenario's level. Dirty read and committed read share this script.
async fn uncommitted_write<D: DbDriver>(
    driver: &D,
    scenario: Scenario,
    options: &ScenarioOptions,
    narrator: &dyn Narrator,
) -> ScopedRun<Observation> {
    let caption = match scenario {
        Scenario::DirtyRead => "Dirty Read (READ UNCOMMITTED)",
        _ => "Read (READ COMMITTED)",
    };

    scoped(
        driver,
        ["Transaction 1", "Transaction 2"],
        async |[writer, reader]: &mut [D::Session; 2]| {
            // autocommit read, outside both transactions
            let before = reader.read_balance(ALICE).await?;

            narrator.say(&stamped(&format!("{} started", writer.label())));
            writer.begin(Some(IsolationLevel::ReadUncommitted)).await?;
            writer.set_balance(ALICE, options.written).await?;

            narrator.say(&stamped(&format!("{} started", reader.label())));
            reader.begin(scenario.observer_level()).await?;
            let observed = reader.read_balance(ALICE).await?;
            narrator.say(&format!("{caption}: Alice's balance = {observed}"));

            narrator.say(&stamped(&format!("{} rollback()", writer.label())));
            writer.rollback().await?;
            narrator.say(&stamped(&format!("{} commit()", reader.label())));
            reader.commit().await?;

            let written = options.written;
            Ok(match scenario {
                Scenario::DirtyRead => Observation::DirtyRead {
                    before,
                    observed,
                    written,
                },
                _ => Observation::CommittedRead {
                    before,
                    observed,
                    written,
                },
            })
        },
    )
    .await
}

/// Transaction 1 reads Alice twice at the scenario's level while Transaction
/// 2 commits an update in between; Transaction 3 restores the baseline.
async fn reread<D: DbDriver>(
    driver: &D,
    scenario: Scenario,
    options: &ScenarioOptions,
    narrator: &dyn Narrator,
) -> ScopedRun<Observation> {
    let repeatable = scenario == Scenario::RepeatableRead;

    scoped(
        driver,
        ["Transaction 1", "Transaction 2", "Transaction 3"],
        async |[reader, writer, resetter]: &mut [D::Session; 3]| {
            narrator.say(&stamped(&format!("{} started", reader.label())));
            reader.begin(scenario.observer_level()).await?;
            let first = reader.read_balance(ALICE).await?;
            narrator.say(&format!("{}: Alice's initial balance = {first}", reader.label()));

            narrator.say(&stamped(&format!("{} started", writer.label())));
            writer.begin(Some(IsolationLevel::ReadCommitted)).await?;
            writer.set_balance(ALICE, options.written).await?;
            if !repeatable {
                narrator.say(&format!(
                    "{} updated Alice's balance to {}",
                    writer.label(),
                    options.written
                ));
            }
            writer.commit().await?;

            let second = reader.read_balance(ALICE).await?;
            if repeatable {
                narrator.say(&format!(
                    "{}: Alice's balance after update = {second}",
                    reader.label()
                ));
                narrator.say(&stamped(&format!("{} rollback()", reader.label())));
                reader.rollback().await?;
            } else {
                narrator.say(&format!(
                    "{}: Alice's balance after update in another transaction = {second}",
                    reader.label()
                ));
                narrator.say(&stamped(&format!("{} commit()", reader.label())));
                reader.commit().await?;
            }

            resetter.begin(Some(IsolationLevel::ReadCommitted)).await?;
            resetter.set_balance(ALICE, options.baseline).await?;
            resetter.commit().await?;
            narrator.say(&format!(
                "{} reset Alice's balance to {}",
                resetter.label(),
                options.baseline
            ));

            let written = options.written;
            Ok(if repeatable {
                Observation::RepeatableRead {
                    first,
                    second,
                    written,
                }
            } else {
                Observation::NonRepeatableRead {
                    first,
                    second,
                    written,
                }
            })
        },
    )
    .await
}

/// Transaction 1 locks Alice, Transaction 2 locks Bob, then each asks for
/// the other's row. Both requests are in flight together so the server sees
/// the cycle and aborts one of them.
async fn deadlock<D: DbDriver>(
    driver: &D,
    options: &ScenarioOptions,
    narrator: &dyn Narrator,
) -> ScopedRun<Observation> {
    let level = Scenario::Deadlock.observer_level();

    scoped(
        driver,
        ["Transaction 1", "Transaction 2"],
        async |[first, second]: &mut [D::Session; 2]| {
            narrator.say(&stamped(&format!("{} started", first.label())));
            first.begin(level).await?;
            first.lock_balance(ALICE).await?;
            narrator.say(&format!("{} locked Alice's account.", first.label()));

            narrator.say(&stamped(&format!("{} started", second.label())));
            second.begin(level).await?;
            second.lock_balance(BOB).await?;
            narrator.say(&format!("{} locked Bob's account.", second.label()));

            narrator.say(&format!(
                "{} attempts to lock Bob's account (blocked by {})...",
                first.label(),
                second.label()
            ));
            let stagger = options.lock_stagger;
            let first_label = first.label().to_owned();
            let (first_lock, second_lock) = tokio::join!(first.lock_balance(BOB), async {
                tokio::time::sleep(stagger).await;
                narrator.say(&format!(
                    "{} attempts to lock Alice's account (blocked by {first_label})...",
                    second.label()
                ));
                second.lock_balance(ALICE).await
            });

            let first_outcome = settle(first, first_lock, narrator).await?;
            let second_outcome = settle(second, second_lock, narrator).await?;
            Ok(Observation::Deadlock {
                first: first_outcome,
                second: second_outcome,
            })
        },
    )
    .await
}

/// Finish one side of the deadlock: commit if its lock was granted, roll
/// back otherwise.
async fn settle<S: DbSession>(
    session: &mut S,
    lock: Result<Balance, DriverError>,
    narrator: &dyn Narrator,
) -> Result<LockOutcome, DriverError> {
    let outcome = match lock {
        Ok(_) => {
            narrator.say(&format!("{} acquired its second lock.", session.label()));
            narrator.say(&stamped(&format!("{} commit()", session.label())));
            session.commit().await?;
            return Ok(LockOutcome::Acquired);
        }
        Err(err) if err.is_deadlock() => {
            narrator.say(&format!("Error: {err}"));
            LockOutcome::DeadlockVictim
        }
        Err(err) => {
            if err.is_lock_wait_timeout() {
                warn!(
                    session = session.label(),
                    "lock wait timed out; is deadlock detection disabled?"
                );
            }
            narrator.say(&format!("Error: {err}"));
            LockOutcome::Failed(err.to_string())
        }
    };
    narrator.say(&stamped(&format!("{} rollback()", session.label())));
    session.rollback().await?;
    Ok(outcome)
}
