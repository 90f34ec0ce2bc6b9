//! Observer registry for backend status changes.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::models::BackendStatus;

type Callback = Arc<dyn Fn(BackendStatus) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

/// Ordered set of status callbacks.
#[derive(Clone, Default)]
pub struct NotificationHub {
    registry: Arc<Mutex<Registry>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` and immediately deliver `current` to it, so a late
    /// subscriber always starts from the status in force when it subscribed.
    pub fn subscribe<F>(&self, callback: F, current: BackendStatus) -> Subscription
    where
        F: Fn(BackendStatus) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, callback.clone()));
            id
        };

        deliver(&callback, current);

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Invoke every registered callback in subscription order.
    ///
    /// The registry lock is released before any callback runs, so callbacks may
    /// subscribe or unsubscribe. A panicking callback is logged and skipped.
    pub fn notify(&self, status: BackendStatus) {
        let callbacks: Vec<Callback> = self
            .registry
            .lock()
            .entries
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        for callback in callbacks {
            deliver(&callback, status);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }
}

/// Call one callback, containing any panic it raises.
fn deliver(callback: &Callback, status: BackendStatus) {
    if catch_unwind(AssertUnwindSafe(|| callback(status))).is_err() {
        tracing::error!("Status subscriber panicked while handling {}", status);
    }
}

/// Handle returned by subscribing. Dropping it keeps the subscription alive.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove this registration. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}
