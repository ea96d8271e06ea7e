//! Per-sheet mutual exclusion.
//!
//! The registry hands out one async mutex per sheet name. Entries are created
//! on first use, so the table grows with the number of distinct users that
//! have written since the last [`SheetLocks::prune_idle`] pass.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct SheetLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Exclusive access to one sheet. Released on drop.
pub struct SheetGuard {
    sheet: String,
    _guard: OwnedMutexGuard<()>,
}

impl SheetGuard {
    pub fn sheet(&self) -> &str {
        &self.sheet
    }
}

impl SheetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder has `sheet` locked.
    pub async fn acquire(&self, sheet: &str) -> SheetGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(sheet.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        SheetGuard {
            sheet: sheet.to_string(),
            _guard: lock.lock_owned().await,
        }
    }

    /// Removes locks nobody holds or waits on. Returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = locks.len();
        // Holders and waiters keep a clone of the Arc, and clones are only
        // taken under this map lock.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
