use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use hole_types::Address;

/// Per-address mutual exclusion.
///
/// Operations on the same address run one at a time; different addresses
/// never contend. An entry lives only while some task holds or waits on it.
#[derive(Default)]
pub struct AddressLocks {
    entries: Mutex<HashMap<Address, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one operation on an address.
pub struct AddressGuard<'a> {
    locks: &'a AddressLocks,
    address: Address,
    guard: Option<OwnedMutexGuard<()>>,
}

impl AddressLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, address: &Address) -> AddressGuard<'_> {
        let entry = {
            let mut entries = self.entries.lock().expect("address lock table poisoned");
            Arc::clone(entries.entry(*address).or_default())
        };
        AddressGuard {
            locks: self,
            address: *address,
            guard: Some(entry.lock_owned().await),
        }
    }

    /// Number of addresses currently locked or awaited.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("address lock table poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for AddressGuard<'_> {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let entry = Arc::clone(OwnedMutexGuard::mutex(&guard));
        drop(guard);
        let mut entries = self.locks.entries.lock().expect("address lock table poisoned");
        // One reference in the table and ours: nobody else is waiting.
        if Arc::strong_count(&entry) == 2 {
            entries.remove(&self.address);
        }
    }
}
