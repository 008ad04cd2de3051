//! Daily counter reset at local midnight.
//!
//! The worker wakes at the earlier of the next local midnight and the
//! configured check interval, then asks the allocator to reset if the stored
//! marker is not today. The marker makes the reset fire once per day no matter
//! how often the worker wakes or whether the process was down at midnight.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Days, Local};
use tracing::{debug, error};

use crate::allocator::CounterAllocator;
use crate::clock::Clock;

/// The first local midnight strictly after `now`.
pub fn next_local_midnight(now: DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        // No local midnight (DST gap at 00:00): re-check in an hour
        .unwrap_or_else(|| now + chrono::Duration::hours(1))
}

/// How long the worker should sleep before its next check.
pub fn next_wait(now: DateTime<Local>, check_interval: Duration) -> Duration {
    (next_local_midnight(now) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .min(check_interval)
}

/// Handle to the background reset worker. Dropping it stops the worker.
pub struct DailyResetHandle {
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl DailyResetHandle {
    /// Stop the worker and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    fn stop(&mut self) {
        // Dropping the sender wakes the worker with a disconnect
        self.shutdown.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("daily reset worker panicked");
            }
        }
    }
}

impl Drop for DailyResetHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start the background daily reset worker.
pub fn spawn_daily_reset(
    allocator: Arc<CounterAllocator>,
    clock: Arc<dyn Clock>,
    check_interval: Duration,
) -> std::io::Result<DailyResetHandle> {
    let (tx, rx) = mpsc::channel::<()>();

    let worker = thread::Builder::new()
        .name("daily-reset".into())
        .spawn(move || loop {
            let wait = next_wait(clock.now(), check_interval);
            debug!(?wait, "daily reset worker sleeping");

            match rx.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(e) = allocator.reset_if_new_day(clock.now()) {
                        error!(error = %e, "daily counter reset failed");
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        })?;

    Ok(DailyResetHandle {
        shutdown: Some(tx),
        worker: Some(worker),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_midnight() {
        let now = Local.with_ymd_and_hms(2024, 1, 15, 23, 59, 30).unwrap();
        let midnight = next_local_midnight(now);
        assert_eq!(midnight, Local.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_next_midnight_from_midnight() {
        let now = Local.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap();
        assert_eq!(
            next_local_midnight(now),
            Local.with_ymd_and_hms(2024, 1, 17, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_wait_capped_by_interval() {
        let now = Local.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(
            next_wait(now, Duration::from_secs(300)),
            Duration::from_secs(300)
        );

        let late = Local.with_ymd_and_hms(2024, 1, 15, 23, 59, 50).unwrap();
        assert_eq!(
            next_wait(late, Duration::from_secs(300)),
            Duration::from_secs(10)
        );
    }
}
