//! Change listeners
//!
//! Listener callbacks run synchronously after a store changed. A panicking
//! listener is logged and skipped; the remaining listeners still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tracing::error;

/// Observer of store changes
pub trait DataListener<T>: Send + Sync {
    fn on_added(&self, data: &T);

    fn on_removed(&self, data: &T);

    fn on_refreshed(&self, _data: &T) {}
}

/// Registered listeners of one store
pub struct ListenerSet<T> {
    listeners: RwLock<Vec<Arc<dyn DataListener<T>>>>,
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        ListenerSet {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

fn same_listener<T>(a: &Arc<dyn DataListener<T>>, b: &Arc<dyn DataListener<T>>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl<T> ListenerSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn DataListener<T>>) {
        let mut listeners = self.listeners.write().unwrap_or_else(|p| p.into_inner());
        listeners.push(listener);
    }

    /// Returns whether the listener was registered
    pub fn remove(&self, listener: &Arc<dyn DataListener<T>>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|p| p.into_inner());
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self, store: &str, event: &'static str, call: impl Fn(&dyn DataListener<T>)) {
        // Callbacks may register listeners themselves, so call outside the lock
        let listeners: Vec<_> = self
            .listeners
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| call(listener.as_ref()))).is_err() {
                error!(store, event, "Listener panicked");
            }
        }
    }

    pub fn notify_added(&self, store: &str, data: &T) {
        self.notify(store, "on_added", |l| l.on_added(data));
    }

    pub fn notify_removed(&self, store: &str, data: &T) {
        self.notify(store, "on_removed", |l| l.on_removed(data));
    }

    pub fn notify_refreshed(&self, store: &str, data: &T) {
        self.notify(store, "on_refreshed", |l| l.on_refreshed(data));
    }
}
