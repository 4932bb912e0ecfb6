use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;

type Pending<T> = HashMap<String, Arc<OnceCell<T>>>;

/// Per-key registry of in-flight work.
///
/// Concurrent callers of [`InFlight::run`] with the same key share one
/// execution of the work future and all receive a clone of its output. The
/// entry is dropped once the work completes, so a later call for the same
/// key runs the work again.
///
/// If the caller driving the work is cancelled, one of the waiting callers
/// picks it up. When the last caller for a key goes away, completed or not,
/// the key is removed.
pub struct InFlight<T> {
    pending: Mutex<Pending<T>>,
}

impl<T: Clone> InFlight<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` for `key`, or join an execution already in progress.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = self
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let waiter = Waiter {
            registry: self,
            key,
            cell,
        };

        let value = waiter.cell.get_or_init(work).await.clone();
        value
    }

    /// Number of keys with work in progress.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no work is in progress.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The map is never left half-updated, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, Pending<T>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Default for InFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One caller's hold on a pending key.
///
/// Dropped on completion and on cancellation alike. The key is removed once
/// its work has finished or no other caller is still waiting on it.
struct Waiter<'a, T: Clone> {
    registry: &'a InFlight<T>,
    key: &'a str,
    cell: Arc<OnceCell<T>>,
}

impl<T: Clone> Drop for Waiter<'_, T> {
    fn drop(&mut self) {
        let mut pending = self.registry.lock();

        let Some(current) = pending.get(self.key) else {
            return;
        };
        if !Arc::ptr_eq(current, &self.cell) {
            return;
        }

        // Clones are only taken under the lock: the map and this waiter hold
        // two references, any more belong to callers still waiting
        if self.cell.initialized() || Arc::strong_count(&self.cell) <= 2 {
            pending.remove(self.key);
        }
    }
}
