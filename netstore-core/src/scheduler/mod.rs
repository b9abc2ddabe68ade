//! Periodic background tasks
//!
//! A [`PeriodicTask`] runs an async callback at a fixed interval on the tokio
//! runtime until stopped. Stopping is idempotent and also happens on drop.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Shortest period a task runs with, shorter ones are raised to it
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Cancellable fixed-interval task
///
/// The first run happens one period after spawning. Ticks that fall behind
/// are delayed rather than bunched.
pub struct PeriodicTask {
    name: String,
    period: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTask {
    /// Spawn on the current tokio runtime
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, mut task: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let period = period.max(MIN_PERIOD);
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                trace!(task = %task_name, "Periodic task tick");
                task().await;
            }
        });
        debug!(task = %name, period_ms = period.as_millis() as u64, "Started periodic task");

        PeriodicTask {
            name,
            period,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Abort the task; stopping a stopped task does nothing
    pub fn stop(&self) {
        if let Some(handle) = self.handle().take() {
            handle.abort();
            debug!(task = %self.name, "Stopped periodic task");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}
