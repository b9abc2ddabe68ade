//! Listener that records every event it receives

use std::sync::Mutex;

use crate::core_store::service::DataListener;

#[derive(Debug)]
pub struct RecordingListener<T> {
    added: Mutex<Vec<T>>,
    removed: Mutex<Vec<T>>,
    refreshed: Mutex<Vec<T>>,
}

impl<T: Clone> RecordingListener<T> {
    pub fn new() -> Self {
        RecordingListener {
            added: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            refreshed: Mutex::new(Vec::new()),
        }
    }

    pub fn added(&self) -> Vec<T> {
        self.added.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn removed(&self) -> Vec<T> {
        self.removed.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn refreshed(&self) -> Vec<T> {
        self.refreshed.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl<T: Clone + Send> DataListener<T> for RecordingListener<T> {
    fn on_added(&self, data: &T) {
        self.added.lock().unwrap_or_else(|p| p.into_inner()).push(data.clone());
    }

    fn on_removed(&self, data: &T) {
        self.removed.lock().unwrap_or_else(|p| p.into_inner()).push(data.clone());
    }

    fn on_refreshed(&self, data: &T) {
        self.refreshed.lock().unwrap_or_else(|p| p.into_inner()).push(data.clone());
    }
}
