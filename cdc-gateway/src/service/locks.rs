//! Per-pipeline operation locks
//!
//! Mutating operations on one pipeline are mutually exclusive. A second
//! operation arriving while the first is in flight fails fast instead of
//! queueing behind a deployment that can take minutes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct PipelineLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PipelineLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock for `id`, or `None` when another operation holds it
    pub fn try_acquire(&self, id: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(id.to_string()).or_default().clone()
        };
        lock.try_lock_owned().ok()
    }

    /// Drops the lock entry of a deleted pipeline
    ///
    /// Callers still holding a guard keep their lock alive until it drops.
    pub fn forget(&self, id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(id);
    }
}
