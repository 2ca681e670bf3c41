//! Per-tab set of change callbacks.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// A zero-argument change callback.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Slots {
    next_id: u64,
    callbacks: BTreeMap<u64, Callback>,
}

/// Callbacks interested in "data changed" signals.
///
/// Invoked after every local write and for every invalidation received from
/// another tab. No ordering among callbacks is promised.
#[derive(Default)]
pub struct SubscriberRegistry {
    slots: Mutex<Slots>,
}

impl SubscriberRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a callback. Each call yields an independent subscription, even
    /// for the same closure.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut slots = self.slots();
        let id = slots.next_id;
        slots.next_id += 1;
        slots.callbacks.insert(id, Arc::new(callback));

        Subscription {
            registry: Arc::downgrade(self),
            id,
        }
    }

    /// Invoke every registered callback; returns how many ran.
    ///
    /// The set is snapshotted first, so callbacks may subscribe or unsubscribe
    /// without deadlocking.
    pub fn notify(&self) -> usize {
        let snapshot: Vec<Callback> = self.slots().callbacks.values().cloned().collect();
        tracing::trace!(subscribers = snapshot.len(), "notifying subscribers");
        for callback in &snapshot {
            callback();
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.slots().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) -> bool {
        self.slots().callbacks.remove(&id).is_some()
    }

    // Callbacks never run under the lock, so a poisoned guard still holds a
    // consistent map.
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by [`SubscriberRegistry::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<SubscriberRegistry>,
    id: u64,
}

impl Subscription {
    /// Remove the callback. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
