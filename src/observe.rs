// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Observer registry and subscription handles.
//!
//! Every subscribe call in the crate hands back a [`Subscription`]. Dropping
//! it (or calling [`Subscription::cancel`]) detaches the observer or stops the
//! background feed behind it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle that tears a subscription down when cancelled or dropped.
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Subscription backed by a spawned task; cancelling aborts the task.
    pub fn from_task(handle: tokio::task::JoinHandle<()>) -> Self {
        Self::new(move || handle.abort())
    }

    /// A subscription with nothing to tear down.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

struct ObserverTable<T> {
    next_key: u64,
    callbacks: BTreeMap<u64, Callback<T>>,
}

/// Registry of callbacks notified synchronously, in subscription order.
pub struct Observers<T> {
    table: Arc<Mutex<ObserverTable<T>>>,
}

impl<T> Clone for Observers<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(ObserverTable {
                next_key: 0,
                callbacks: BTreeMap::new(),
            })),
        }
    }
}

impl<T: 'static> Observers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let key = {
            let mut table = lock(&self.table);
            let key = table.next_key;
            table.next_key += 1;
            table.callbacks.insert(key, Arc::new(callback));
            key
        };

        let weak: Weak<Mutex<ObserverTable<T>>> = Arc::downgrade(&self.table);
        Subscription::new(move || {
            if let Some(table) = weak.upgrade() {
                lock(&table).callbacks.remove(&key);
            }
        })
    }

    /// Call every observer with `value`.
    ///
    /// The registry lock is not held while callbacks run, so a callback may
    /// subscribe or cancel without deadlocking.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = lock(&self.table).callbacks.values().cloned().collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.table).callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(table: &Mutex<ObserverTable<T>>) -> MutexGuard<'_, ObserverTable<T>> {
    // A panicking observer must not wedge every later notification.
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_reaches_all_observers() {
        let observers = Observers::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        let t1 = total.clone();
        let _a = observers.subscribe(move |v| {
            t1.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let t2 = total.clone();
        let _b = observers.subscribe(move |v| {
            t2.fetch_add(*v as usize * 10, Ordering::SeqCst);
        });

        observers.notify(&2);
        assert_eq!(total.load(Ordering::SeqCst), 22);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let observers = Observers::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        let sub = observers.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        observers.notify(&());
        drop(sub);
        observers.notify(&());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(observers.is_empty());
    }

    #[test]
    fn test_cancel_after_registry_dropped_is_harmless() {
        let observers = Observers::<()>::new();
        let sub = observers.subscribe(|_| {});
        drop(observers);
        sub.cancel();
    }

    #[tokio::test]
    async fn test_task_subscription_aborts_task() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _tx = tx;
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        Subscription::from_task(handle).cancel();

        // The aborted task drops its sender, which closes the channel.
        let closed = tokio::time::timeout(std::time::Duration::from_secs(1), rx).await;
        assert!(matches!(closed, Ok(Err(_))));
    }
}
