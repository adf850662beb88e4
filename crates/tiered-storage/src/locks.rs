//! Per-name mutual exclusion
//!
//! Upload, download, delete and eviction of the same name are serialised;
//! different names proceed independently. Idle mutexes are dropped from the
//! table when their last guard goes away.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

#[derive(Clone, Default)]
pub struct NameLocks {
    table: LockTable,
}

/// Held while operating on one name
pub struct NameGuard {
    name: String,
    table: LockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

fn lock_table(table: &LockTable) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `name`
    pub async fn lock(&self, name: &str) -> NameGuard {
        let mutex = lock_table(&self.table)
            .entry(name.to_string())
            .or_default()
            .clone();

        let guard = mutex.lock_owned().await;
        NameGuard {
            name: name.to_string(),
            table: self.table.clone(),
            guard: Some(guard),
        }
    }

    /// Names with a live mutex (held or awaited)
    pub fn tracked(&self) -> usize {
        lock_table(&self.table).len()
    }
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut table = lock_table(&self.table);
        let idle = table
            .get(&self.name)
            .map(|mutex| Arc::strong_count(mutex) == 1)
            .unwrap_or(false);
        if idle {
            table.remove(&self.name);
        }
    }
}
