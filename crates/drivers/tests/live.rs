//! Scenario runs against a real MySQL server.
//!
//! Tests marked `#[ignore]` need a disposable database reachable through the
//! `DB_*` variables (`DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`,
//! `DB_NAME`). They seed `accounts` themselves:
//!
//! ```sh
//! cargo test -p isodemo_drivers -- --ignored
//! ```

use isodemo_core::transcript::RecordingNarrator;
use isodemo_core::{
    LockOutcome, Observation, Scenario, Verdict, ALICE, BASELINE_BALANCE, BOB, WRITTEN_BALANCE,
};
use isodemo_drivers::scenarios::{run_all, run_scenario, ScenarioOptions};
use isodemo_drivers::seed::{current_balance, seed_accounts};
use isodemo_drivers::{ConnectionConfig, MySqlDriver};
use tokio::sync::{Mutex, MutexGuard};

/// The scenarios share two rows; live tests take turns.
static SERIAL: Mutex<()> = Mutex::const_new(());

async fn seeded() -> (MutexGuard<'static, ()>, MySqlDriver) {
    let guard = SERIAL.lock().await;
    let config = ConnectionConfig::from_env().expect("DB_* variables must name a test database");
    let driver = MySqlDriver::new(&config);
    seed_accounts(&driver, BASELINE_BALANCE).await.unwrap();
    (guard, driver)
}

fn unreachable_driver() -> MySqlDriver {
    MySqlDriver::new(&ConnectionConfig {
        host: "127.0.0.1".into(),
        port: 1,
        user: "nobody".into(),
        password: "nothing".into(),
        database: "test_db".into(),
    })
}

#[tokio::test]
async fn unreachable_server_is_reported_per_scenario() {
    let driver = unreachable_driver();
    let narrator = RecordingNarrator::default();
    let reports = run_all(&driver, &Scenario::ALL, &ScenarioOptions::default(), &narrator).await;

    assert_eq!(reports.len(), 5);
    for report in &reports {
        assert!(report.error.is_some(), "{report:?}");
        assert_eq!(report.observation, None);
        assert_eq!((report.opened, report.closed), (0, 0));
        assert!(!report.passed());
    }

    let lines = narrator.lines();
    for scenario in Scenario::ALL {
        assert!(lines.iter().any(|l| l == scenario.heading()));
    }
    let errors = lines.iter().filter(|l| l.starts_with("Error: could not connect")).count();
    assert_eq!(errors, 5);
}

#[tokio::test]
#[ignore = "requires database"]
async fn dirty_read_observes_rolled_back_write() {
    let (_guard, driver) = seeded().await;
    let narrator = RecordingNarrator::default();
    let report =
        run_scenario(&driver, Scenario::DirtyRead, &ScenarioOptions::default(), &narrator).await;

    assert_eq!(
        report.observation,
        Some(Observation::DirtyRead {
            before: BASELINE_BALANCE,
            observed: WRITTEN_BALANCE,
            written: WRITTEN_BALANCE,
        })
    );
    assert!(report.passed(), "{}", report.summary());
    assert!(narrator
        .lines()
        .contains(&"Dirty Read (READ UNCOMMITTED): Alice's balance = 9999".to_owned()));
    // the writer rolled back
    assert_eq!(current_balance(&driver, ALICE).await.unwrap(), BASELINE_BALANCE);
}

#[tokio::test]
#[ignore = "requires database"]
async fn committed_read_hides_uncommitted_write() {
    let (_guard, driver) = seeded().await;
    let narrator = RecordingNarrator::default();
    let report =
        run_scenario(&driver, Scenario::CommittedRead, &ScenarioOptions::default(), &narrator)
            .await;

    let Some(Observation::CommittedRead { observed, .. }) = report.observation else {
        panic!("no observation: {report:?}");
    };
    assert_eq!(observed, BASELINE_BALANCE);
    assert_ne!(observed, WRITTEN_BALANCE);
    assert!(report.passed(), "{}", report.summary());
}

#[tokio::test]
#[ignore = "requires database"]
async fn repeatable_read_reads_agree() {
    let (_guard, driver) = seeded().await;
    let narrator = RecordingNarrator::default();
    let report =
        run_scenario(&driver, Scenario::RepeatableRead, &ScenarioOptions::default(), &narrator)
            .await;

    let Some(Observation::RepeatableRead { first, second, .. }) = report.observation else {
        panic!("no observation: {report:?}");
    };
    assert_eq!(first, second);
    assert_eq!((report.opened, report.closed), (3, 3));
    assert_eq!(current_balance(&driver, ALICE).await.unwrap(), BASELINE_BALANCE);
}

#[tokio::test]
#[ignore = "requires database"]
async fn non_repeatable_read_sees_commit() {
    let (_guard, driver) = seeded().await;
    let narrator = RecordingNarrator::default();
    let report = run_scenario(
        &driver,
        Scenario::NonRepeatableRead,
        &ScenarioOptions::default(),
        &narrator,
    )
    .await;

    let Some(Observation::NonRepeatableRead { first, second, .. }) = report.observation else {
        panic!("no observation: {report:?}");
    };
    assert_ne!(first, second);
    assert_eq!(second, WRITTEN_BALANCE);
    assert_eq!(report.verdict(), Some(Verdict::Demonstrated));
    assert_eq!(current_balance(&driver, ALICE).await.unwrap(), BASELINE_BALANCE);
}

#[tokio::test]
#[ignore = "requires database"]
async fn deadlock_aborts_exactly_one_side() {
    let (_guard, driver) = seeded().await;
    let narrator = RecordingNarrator::default();
    let report =
        run_scenario(&driver, Scenario::Deadlock, &ScenarioOptions::default(), &narrator).await;

    let Some(Observation::Deadlock { first, second }) = &report.observation else {
        panic!("no observation: {report:?}");
    };
    let victims = [first, second]
        .into_iter()
        .filter(|o| **o == LockOutcome::DeadlockVictim)
        .count();
    assert_eq!(victims, 1, "{first} / {second}");
    assert_eq!((report.opened, report.closed), (2, 2));
    assert!(report.passed(), "{}", report.summary());
    assert!(narrator.lines().iter().any(|l| l.contains("Deadlock found")));

    // both rows are unlocked again
    assert_eq!(current_balance(&driver, BOB).await.unwrap(), BASELINE_BALANCE);
}

#[tokio::test]
#[ignore = "requires database"]
async fn full_suite_twice_ends_at_baseline() {
    let (_guard, driver) = seeded().await;
    let options = ScenarioOptions::default();

    for _ in 0..2 {
        let narrator = RecordingNarrator::default();
        let reports = run_all(&driver, &Scenario::ALL, &options, &narrator).await;
        for report in &reports {
            assert!(report.passed(), "{}", report.summary());
        }
        assert_eq!(current_balance(&driver, ALICE).await.unwrap(), BASELINE_BALANCE);
    }
}

#[tokio::test]
#[ignore = "requires database"]
async fn wrong_password_fails_without_leaking() {
    let (_guard, driver) = seeded().await;
    drop(driver);
    let mut config = ConnectionConfig::from_env().unwrap();
    config.password.push_str("-wrong");
    let driver = MySqlDriver::new(&config);

    let narrator = RecordingNarrator::default();
    let report =
        run_scenario(&driver, Scenario::Deadlock, &ScenarioOptions::default(), &narrator).await;
    assert!(report.error.is_some());
    assert_eq!((report.opened, report.closed), (0, 0));
}
