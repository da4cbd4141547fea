//! Acquire sessions, run steps on them, release them on every exit path.

use tracing::{debug, warn};

use crate::{DbDriver, DbSession, DriverError};

/// Result of [`scoped`]: what the steps returned and how many sessions were
/// opened and released.
#[derive(Debug)]
pub struct ScopedRun<T> {
    pub outcome: Result<T, DriverError>,
    pub opened: usize,
    pub closed: usize,
}

/// Open one session per label, run `steps` over all of them, then release
/// every session that was opened.
///
/// If opening a session fails the steps never run; only the sessions that
/// were actually opened are released and the connection error becomes the
/// outcome. A session whose connection fails to close is logged and counted
/// as not closed; that never replaces the outcome of the steps.
pub async fn scoped<D, const N: usize, T, F>(
    driver: &D,
    labels: [&str; N],
    steps: F,
) -> ScopedRun<T>
where
    D: DbDriver,
    F: AsyncFnOnce(&mut [D::Session; N]) -> Result<T, DriverError>,
{
    let mut acquired = Vec::with_capacity(N);
    for label in labels {
        match driver.connect(label).await {
            Ok(session) => acquired.push(session),
            Err(err) => {
                warn!(session = label, error = %err, "could not open session");
                let opened = acquired.len();
                let closed = release_all(acquired).await;
                return ScopedRun {
                    outcome: Err(err),
                    opened,
                    closed,
                };
            }
        }
    }

    let mut sessions = match <[D::Session; N]>::try_from(acquired) {
        Ok(sessions) => sessions,
        Err(acquired) => {
            let opened = acquired.len();
            let closed = release_all(acquired).await;
            return ScopedRun {
                outcome: Err(DriverError::SessionCount {
                    expected: N,
                    opened,
                }),
                opened,
                closed,
            };
        }
    };

    let outcome = steps(&mut sessions).await;
    let closed = release_all(sessions).await;
    ScopedRun {
        outcome,
        opened: N,
        closed,
    }
}

async fn release_all<S: DbSession>(sessions: impl IntoIterator<Item = S>) -> usize {
    let mut closed = 0;
    for session in sessions {
        let label = session.label().to_owned();
        match session.release().await {
            Ok(()) => {
                debug!(session = %label, "released");
                closed += 1;
            }
            Err(err) => warn!(session = %label, error = %err, "release failed"),
        }
    }
    closed
}
