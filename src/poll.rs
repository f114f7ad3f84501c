use std::future::Future;
use std::time::Duration;

use tokio::time;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

#[derive(Debug, PartialEq)]
pub enum PollOutcome<T> {
    Resolved(T),
    Exhausted { attempts: u32 },
}

/// Poll `check` at a fixed cadence until it resolves or the attempt ceiling
/// is reached.
///
/// One request per tick: the next tick is scheduled only after the previous
/// check returns, so a check slower than the interval delays the cadence
/// instead of piling up concurrent requests. A check error consumes an
/// attempt and is logged, not propagated — the loop itself is the retry
/// mechanism. Cancellation is the caller's: abort the task running this
/// future and no further checks are issued.
pub async fn poll_until<T, E, F, Fut>(config: PollConfig, mut check: F) -> PollOutcome<T>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    for attempt in 1..=config.max_attempts {
        time::sleep(config.interval).await;
        match check(attempt).await {
            Ok(Some(resolved)) => return PollOutcome::Resolved(resolved),
            Ok(None) => {}
            Err(err) => warn!(attempt, %err, "status check failed; will retry"),
        }
    }
    PollOutcome::Exhausted {
        attempts: config.max_attempts,
    }
}
