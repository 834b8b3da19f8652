//! Lifecycle-scoped periodic trigger.
//!
//! [`start`] fires its handler immediately and then once per period, measured
//! from the moment it was started. Each firing is spawned as its own task, so a
//! slow handler never shifts the schedule and several may run at once.
//! Stopping only prevents new firings; handlers already running finish on
//! their own.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

/// Owned handle to a running schedule. Dropping it stops the schedule.
#[derive(Debug)]
pub struct ScheduleHandle {
    task: Option<JoinHandle<()>>,
}

impl ScheduleHandle {
    /// Stops the schedule. Safe to call any number of times.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Schedule stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts firing `handler` every `period`. Must be called inside a tokio runtime.
///
/// # Panics
///
/// Panics if `period` is zero.
pub fn start<F, Fut>(period: Duration, handler: F) -> ScheduleHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    assert!(!period.is_zero(), "schedule period must be non-zero");

    let task = tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            tokio::spawn(handler());
        }
    });

    ScheduleHandle { task: Some(task) }
}
