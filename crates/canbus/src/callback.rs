//! Callback Dispatch Registry

use crate::frame::{Address, Payload};
use std::sync::{Arc, Mutex, MutexGuard};

/// Handler invoked after an incoming buffer is updated.
///
/// Runs on the drain path for every frame, so keep it short and non-blocking.
pub type CanCallback = Arc<dyn Fn(Address, &Payload) + Send + Sync>;

/// At most one callback per address slot
pub struct CallbackRegistry {
    slots: Mutex<Vec<Option<CanCallback>>>,
}

impl CallbackRegistry {
    /// Create a registry with `len` empty slots
    pub fn new(len: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; len]),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Vec<Option<CanCallback>>> {
        // A panicking callback never runs under this lock, so the data is intact.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a callback, returning the one it replaced.
    ///
    /// `index` must come from the address table this registry was sized for.
    pub fn register(&self, index: usize, callback: CanCallback) -> Option<CanCallback> {
        let mut slots = self.slots();
        debug_assert!(
            index < slots.len(),
            "callback slot {} out of range ({} slots)",
            index,
            slots.len()
        );
        slots.get_mut(index).and_then(|slot| slot.replace(callback))
    }

    /// Remove the callback of a slot
    pub fn remove(&self, index: usize) -> Option<CanCallback> {
        self.slots().get_mut(index).and_then(Option::take)
    }

    /// Clone the callback handle out so it can run without the lock held
    pub fn get(&self, index: usize) -> Option<CanCallback> {
        self.slots().get(index).cloned().flatten()
    }

    /// Number of registered callbacks
    pub fn registered(&self) -> usize {
        self.slots().iter().filter(|slot| slot.is_some()).count()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("registered", &self.registered())
            .finish()
    }
}
