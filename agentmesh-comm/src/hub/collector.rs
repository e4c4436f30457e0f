//! Barrier collectors awaiting a fixed set of named contributions.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

// Layer 3: Internal module imports
use super::error::HubError;
use crate::monitoring::{HubEvent, HubEventKind, Observers};
use crate::util::CollectorId;

struct CollectorState {
    results: Vec<(String, Value)>,
    errors: Vec<(String, String)>,
    completed: bool,
    destroyed: bool,
}

struct CollectorInner {
    id: CollectorId,
    expected: usize,
    state: Mutex<CollectorState>,
    notify: Notify,
    observers: Observers<HubEvent>,
}

/// Barrier releasing its latch once exactly `expected` named
/// contributions (results plus errors) have arrived.
///
/// Each contributor name may submit at most once; later submissions from
/// the same name are ignored. Results keep insertion order.
/// `wait_for_all` resolves with the results snapshot only; callers that
/// need errors read them from [`Collector::errors`]. A collector created
/// with `expected == 0` is complete from the start.
///
/// # Clone Semantics
///
/// Cheap clone via `Arc`; all clones observe the same barrier.
#[derive(Clone)]
pub struct Collector {
    inner: Arc<CollectorInner>,
}

impl Collector {
    pub(crate) fn new(expected: usize, observers: Observers<HubEvent>) -> Self {
        Self {
            inner: Arc::new(CollectorInner {
                id: CollectorId::new(),
                expected,
                state: Mutex::new(CollectorState {
                    results: Vec::new(),
                    errors: Vec::new(),
                    completed: expected == 0,
                    destroyed: false,
                }),
                notify: Notify::new(),
                observers,
            }),
        }
    }

    /// Opaque collector id.
    pub fn id(&self) -> CollectorId {
        self.inner.id
    }

    /// Number of expected contributions.
    pub fn expected(&self) -> usize {
        self.inner.expected
    }

    /// Submit a successful contribution. Returns whether it was accepted
    /// (first submission from this name on an open collector).
    pub fn submit_result(&self, name: impl Into<String>, value: Value) -> bool {
        self.submit(name.into(), Ok(value))
    }

    /// Submit a failed contribution.
    pub fn submit_error(&self, name: impl Into<String>, error: impl Into<String>) -> bool {
        self.submit(name.into(), Err(error.into()))
    }

    fn submit(&self, name: String, outcome: Result<Value, String>) -> bool {
        let completed_now = {
            let mut state = self.inner.state.lock();
            if state.completed || state.destroyed || already_submitted(&state, &name) {
                return false;
            }
            match outcome {
                Ok(value) => state.results.push((name, value)),
                Err(error) => state.errors.push((name, error)),
            }
            if state.results.len() + state.errors.len() == self.inner.expected {
                state.completed = true;
                true
            } else {
                false
            }
        };

        if completed_now {
            self.inner.notify.notify_waiters();
            self.inner
                .observers
                .notify(&HubEvent::now(HubEventKind::CollectorComplete {
                    collector_id: self.inner.id,
                    expected: self.inner.expected,
                }));
        }
        true
    }

    /// Snapshot of successful contributions, insertion order.
    pub fn results(&self) -> Vec<(String, Value)> {
        self.inner.state.lock().results.clone()
    }

    /// Snapshot of failed contributions, insertion order.
    pub fn errors(&self) -> Vec<(String, String)> {
        self.inner.state.lock().errors.clone()
    }

    /// Whether the barrier has released.
    pub fn is_complete(&self) -> bool {
        self.inner.state.lock().completed
    }

    /// Wait until every expected contribution has arrived, then return
    /// the results snapshot.
    ///
    /// On timeout the partial results and errors remain readable and the
    /// call rejects with [`HubError::CollectorTimeout`]. On hub destroy it
    /// rejects with [`HubError::Destroyed`].
    pub async fn wait_for_all(&self, timeout: Duration) -> Result<Vec<(String, Value)>, HubError> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.inner.notify.notified();
            {
                let state = self.inner.state.lock();
                if state.destroyed {
                    return Err(HubError::Destroyed);
                }
                if state.completed {
                    return Ok(state.results.clone());
                }
            }
            if timeout_at(deadline, notified).await.is_err() {
                let received = {
                    let state = self.inner.state.lock();
                    state.results.len() + state.errors.len()
                };
                self.inner
                    .observers
                    .notify(&HubEvent::now(HubEventKind::CollectorTimeout {
                        collector_id: self.inner.id,
                        received,
                        expected: self.inner.expected,
                    }));
                return Err(HubError::CollectorTimeout {
                    collector_id: self.inner.id,
                    received,
                    expected: self.inner.expected,
                });
            }
        }
    }

    /// Reject every waiter with the shutdown error. Called by the hub on
    /// destroy.
    pub(crate) fn poison(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.completed {
                return;
            }
            state.destroyed = true;
        }
        self.inner.notify.notify_waiters();
    }
}

fn already_submitted(state: &CollectorState, name: &str) -> bool {
    state.results.iter().any(|(n, _)| n == name) || state.errors.iter().any(|(n, _)| n == name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use serde_json::json;

    fn collector(expected: usize) -> Collector {
        Collector::new(expected, Observers::new())
    }

    #[tokio::test]
    async fn test_completes_when_all_arrive() {
        let barrier = collector(2);
        assert!(!barrier.is_complete());

        assert!(barrier.submit_result("m1", json!(6)));
        assert!(barrier.submit_result("m2", json!(15)));

        let results = barrier.wait_for_all(Duration::from_millis(100)).await.unwrap();
        assert_eq!(
            results,
            vec![("m1".to_string(), json!(6)), ("m2".to_string(), json!(15))]
        );
    }

    #[tokio::test]
    async fn test_errors_count_toward_completion_but_not_results() {
        let barrier = collector(2);
        barrier.submit_result("ok", json!(1));
        barrier.submit_error("bad", "boom");

        let results = barrier.wait_for_all(Duration::from_millis(100)).await.unwrap();
        assert_eq!(results, vec![("ok".to_string(), json!(1))]);
        assert_eq!(barrier.errors(), vec![("bad".to_string(), "boom".to_string())]);
    }

    #[tokio::test]
    async fn test_duplicate_submissions_ignored() {
        let barrier = collector(2);
        assert!(barrier.submit_result("m1", json!(1)));
        assert!(!barrier.submit_result("m1", json!(2)));
        assert!(!barrier.submit_error("m1", "late"));
        assert!(!barrier.is_complete());

        assert_eq!(barrier.results(), vec![("m1".to_string(), json!(1))]);
    }

    #[tokio::test]
    async fn test_timeout_leaves_partials_readable() {
        let barrier = collector(3);
        barrier.submit_result("m1", json!(1));

        let err = barrier
            .wait_for_all(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::CollectorTimeout {
                received: 1,
                expected: 3,
                ..
            }
        ));
        assert_eq!(barrier.results().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_expected_resolves_immediately() {
        let barrier = collector(0);
        assert!(barrier.is_complete());

        let results = barrier.wait_for_all(Duration::from_millis(10)).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_submissions_after_completion_ignored() {
        let barrier = collector(1);
        assert!(barrier.submit_result("a", json!(1)));
        assert!(!barrier.submit_result("b", json!(2)));
        assert_eq!(barrier.results().len(), 1);
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_final_submission() {
        let barrier = collector(1);
        let waiter = {
            let barrier = barrier.clone();
            tokio::spawn(async move { barrier.wait_for_all(Duration::from_secs(1)).await })
        };
        tokio::task::yield_now().await;

        barrier.submit_result("only", json!(42));
        let results = waiter.await.unwrap().unwrap();
        assert_eq!(results, vec![("only".to_string(), json!(42))]);
    }

    #[tokio::test]
    async fn test_poison_rejects_with_shutdown() {
        let barrier = collector(1);
        let waiter = {
            let barrier = barrier.clone();
            tokio::spawn(async move { barrier.wait_for_all(Duration::from_secs(1)).await })
        };
        tokio::task::yield_now().await;

        barrier.poison();
        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, HubError::Destroyed));
    }
}
