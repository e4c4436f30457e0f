//! Observer registry with synchronous delivery and panic isolation.

// Layer 1: Standard library imports
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::RwLock;

// Layer 3: Internal module imports
use super::traits::ObservableEvent;
use crate::util::ObserverId;

type ObserverFn<E> = Box<dyn Fn(&E) + Send + Sync>;

/// Registry of observer callbacks for one event type.
///
/// Events are delivered synchronously on the emitting thread. A panicking
/// observer is isolated: the panic is caught and swallowed so it can never
/// reach back into core logic. The emitting component must not hold any of
/// its own locks while calling [`Observers::notify`].
///
/// # Clone Semantics
///
/// Cheap clone via `Arc`; all clones share the same registration set.
pub struct Observers<E: ObservableEvent> {
    inner: Arc<RwLock<Vec<(ObserverId, ObserverFn<E>)>>>,
}

impl<E: ObservableEvent> Observers<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register an observer callback; returns its opaque id.
    pub fn observe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ObserverId::new();
        self.inner.write().push((id, Box::new(callback)));
        id
    }

    /// Remove an observer. Idempotent; returns whether it was present.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut observers = self.inner.write();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    /// Deliver an event to every registered observer.
    ///
    /// Callbacks run synchronously in registration order; a panic in one
    /// observer does not affect the others or the caller.
    pub fn notify(&self, event: &E) {
        let observers = self.inner.read();
        for (_, callback) in observers.iter() {
            let _ = catch_unwind(AssertUnwindSafe(|| callback(event)));
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl<E: ObservableEvent> Clone for Observers<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: ObservableEvent> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)] // Tests exercise observer panics
mod tests {
    use super::*;
    use crate::monitoring::traits::EventSeverity;
    use chrono::{DateTime, Utc};
    use serde::Serialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Serialize)]
    struct TestEvent {
        timestamp: DateTime<Utc>,
        value: u32,
    }

    impl ObservableEvent for TestEvent {
        const EVENT_TYPE: &'static str = "test_event";

        fn timestamp(&self) -> DateTime<Utc> {
            self.timestamp
        }

        fn severity(&self) -> EventSeverity {
            EventSeverity::Info
        }
    }

    fn event(value: u32) -> TestEvent {
        TestEvent {
            timestamp: Utc::now(),
            value,
        }
    }

    #[test]
    fn test_notify_reaches_all_observers() {
        let observers = Observers::<TestEvent>::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            observers.observe(move |e| {
                count.fetch_add(e.value as usize, Ordering::SeqCst);
            });
        }

        observers.notify(&event(2));
        assert_eq!(count.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_unobserve_is_idempotent() {
        let observers = Observers::<TestEvent>::new();
        let id = observers.observe(|_| {});

        assert_eq!(observers.len(), 1);
        assert!(observers.unobserve(id));
        assert!(!observers.unobserve(id));
        assert!(observers.is_empty());
    }

    #[test]
    fn test_panicking_observer_is_isolated() {
        let observers = Observers::<TestEvent>::new();
        let count = Arc::new(AtomicUsize::new(0));

        observers.observe(|_| panic!("observer bug"));
        {
            let count = Arc::clone(&count);
            observers.observe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        // The panic must not propagate and later observers still run.
        observers.notify(&event(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clone_shares_registrations() {
        let observers = Observers::<TestEvent>::new();
        let clone = observers.clone();
        clone.observe(|_| {});

        assert_eq!(observers.len(), 1);
        observers.clear();
        assert!(clone.is_empty());
    }
}
