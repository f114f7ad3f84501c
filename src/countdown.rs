use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::debug;

/// Time source for the countdown. Production uses the system clock; tests
/// drive a manual one so expiry can be simulated deterministically.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn seconds_left(clock: &dyn Clock, expires_at: DateTime<Utc>) -> i64 {
    (expires_at - clock.now()).num_seconds().max(0)
}

/// Owned handle to one reservation countdown.
///
/// A 1-second tick recomputes the remaining time from the absolute expiry
/// timestamp (never from an accumulated counter, so drift cannot build up)
/// and publishes it on a watch channel. When the remainder hits zero the
/// expiry callback fires exactly once and the task tears itself down.
/// Dropping or stopping the handle aborts the task; both are idempotent.
pub struct Countdown {
    task: JoinHandle<()>,
    seconds_left: watch::Receiver<i64>,
}

impl Countdown {
    pub fn start<F>(clock: Arc<dyn Clock>, expires_at: DateTime<Utc>, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = watch::channel(seconds_left(clock.as_ref(), expires_at));

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(Duration::from_secs(1));
            // The first interval tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let remaining = (expires_at - clock.now()).num_seconds();
                let _ = tx.send(remaining.max(0));
                if remaining <= 0 {
                    debug!(%expires_at, "countdown reached zero");
                    on_expire();
                    break;
                }
            }
        });

        Self {
            task,
            seconds_left: rx,
        }
    }

    /// Live readout of the remaining seconds for the dialog to render.
    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.seconds_left.clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
pub(crate) struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub(crate) fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
