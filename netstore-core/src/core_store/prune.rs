/*
    prune.rs - Process wide expiry sweep

    Every live store registers a no-argument prune callback under its name.
    The sweep runs all callbacks on a fixed interval; a failing store is
    logged and the remaining stores are still swept.
*/

use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::core_store::store::{handle_poison, StoreResult};
use crate::scheduler::PeriodicTask;

type PruneCallback = Arc<dyn Fn() -> StoreResult<usize> + Send + Sync>;

#[derive(Default)]
pub struct PruneExpiredEntriesService {
    callbacks: RwLock<Vec<(String, PruneCallback)>>,
    task: Mutex<Option<PeriodicTask>>,
}

impl PruneExpiredEntriesService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name`, replacing an earlier registration
    pub fn register<F>(&self, name: impl Into<String>, callback: F) -> StoreResult<()>
    where
        F: Fn() -> StoreResult<usize> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut callbacks = self.callbacks.write().map_err(handle_poison)?;
        callbacks.retain(|(existing, _)| *existing != name);
        debug!(store = %name, "Registered prune callback");
        callbacks.push((name, Arc::new(callback)));
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> StoreResult<bool> {
        let mut callbacks = self.callbacks.write().map_err(handle_poison)?;
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| existing != name);
        Ok(callbacks.len() != before)
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep every registered store once, returns the number of removed entries
    pub fn run_once(&self) -> usize {
        // Callbacks run outside the lock
        let callbacks: Vec<_> = match self.callbacks.read() {
            Ok(callbacks) => callbacks.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        let mut total = 0;
        for (name, callback) in callbacks {
            match callback() {
                Ok(removed) => total += removed,
                Err(e) => error!(store = %name, error = %e, "Expiry sweep failed"),
            }
        }
        if total > 0 {
            info!(removed = total, "Expiry sweep finished");
        }
        total
    }

    /// Start the periodic sweep; a running sweep is replaced
    pub fn start(self: &Arc<Self>, interval: Duration) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = PeriodicTask::spawn("prune-expired", interval, move || {
            let weak = weak.clone();
            async move {
                if let Some(service) = weak.upgrade() {
                    service.run_once();
                }
            }
        });

        let mut slot = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = slot.replace(task) {
            previous.stop();
        }
    }

    /// Stopping a stopped sweep does nothing
    pub fn stop(&self) {
        let task = self.task.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(task) = task {
            task.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.as_ref().map(PeriodicTask::is_running).unwrap_or(false))
            .unwrap_or(false)
    }
}
