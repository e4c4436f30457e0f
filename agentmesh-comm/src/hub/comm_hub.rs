//! Central message hub composing subscriptions, history, locks,
//! collectors, and deadlock detection.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};

// Layer 3: Internal module imports
use super::collector::Collector;
use super::config::HubConfig;
use super::deadlock::{detect_cycles, select_victim, DeadlockInfo, ResolutionStrategy};
use super::error::HubError;
use super::history::MessageHistory;
use super::lock::{AcquireOutcome, LockInfo, LockTable, ReleaseOutcome};
use super::subscription::SubscriptionRegistry;
use crate::message::{Envelope, MessageKind, MessagePriority};
use crate::monitoring::{HubEvent, HubEventKind, Observers};
use crate::util::{AgentAddress, CollectorId, MessageId, ObserverId, SubscriptionId};

struct PendingRequest {
    requester: AgentAddress,
    reply_tx: oneshot::Sender<Envelope>,
}

struct HubInner {
    config: HubConfig,
    subscriptions: RwLock<SubscriptionRegistry>,
    history: RwLock<MessageHistory>,
    pending_requests: DashMap<MessageId, PendingRequest>,
    locks: Mutex<LockTable>,
    collectors: DashMap<CollectorId, Collector>,
    observers: Observers<HubEvent>,
    destroyed: AtomicBool,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

/// Centralized in-process message hub.
///
/// Dispatch is synchronous: `send` delivers to every matching
/// subscription before it returns, and handlers may re-enter the hub
/// (typically to `reply`). Suspension happens only in `request`,
/// `acquire_lock`, and collector waits; every suspending call takes a
/// timeout and removes its pending state before rejecting, so late
/// arrivals cannot signal a caller twice.
///
/// # Clone Semantics
///
/// Cheap clone via `Arc`; all clones share the same state.
///
/// # Example
/// ```rust,ignore
/// let hub = CommHub::new();
/// let responder = hub.clone();
/// hub.subscribe(AgentAddress::new("b"), "ping", move |envelope| {
///     let _ = responder.reply(envelope.id, AgentAddress::new("b"), json!("pong"));
/// })?;
///
/// let reply = hub
///     .request(
///         AgentAddress::new("b"),
///         "ping",
///         json!(null),
///         AgentAddress::new("a"),
///         Duration::from_secs(1),
///     )
///     .await?;
/// ```
#[derive(Clone)]
pub struct CommHub {
    inner: Arc<HubInner>,
}

impl CommHub {
    /// Create a hub with default configuration.
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with explicit configuration. If the configuration
    /// enables the periodic deadlock sweep, the sweep task starts
    /// immediately.
    pub fn with_config(config: HubConfig) -> Self {
        let scan_interval = config.deadlock_scan_interval;
        let scan_strategy = config.deadlock_strategy;
        let hub = Self {
            inner: Arc::new(HubInner {
                history: RwLock::new(MessageHistory::new(config.history_capacity)),
                config,
                subscriptions: RwLock::new(SubscriptionRegistry::new()),
                pending_requests: DashMap::new(),
                locks: Mutex::new(LockTable::new()),
                collectors: DashMap::new(),
                observers: Observers::new(),
                destroyed: AtomicBool::new(false),
                scan_task: Mutex::new(None),
            }),
        };
        if let Some(interval) = scan_interval {
            hub.start_deadlock_scan(interval, scan_strategy);
        }
        hub
    }

    /// Hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Whether `destroy` has run.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    fn check_live(&self) -> Result<(), HubError> {
        if self.is_destroyed() {
            Err(HubError::Destroyed)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Register an observer for hub events.
    pub fn observe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&HubEvent) + Send + Sync + 'static,
    {
        self.inner.observers.observe(callback)
    }

    /// Remove an observer. Idempotent.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.inner.observers.unobserve(id)
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    /// Record an envelope and dispatch it synchronously to every matching
    /// subscription. Succeeds (silently) even when nothing matches.
    pub fn send(&self, envelope: Envelope) -> Result<(), HubError> {
        self.check_live()?;
        self.dispatch(envelope);
        Ok(())
    }

    /// Send `payload` to every subscription of `topic` across all
    /// addresses, excluding the sender's own subscriptions.
    pub fn broadcast(
        &self,
        from: AgentAddress,
        topic: impl Into<String>,
        payload: Value,
        priority: Option<MessagePriority>,
    ) -> Result<(), HubError> {
        let envelope = Envelope::broadcast(from, payload)
            .with_topic(topic)
            .with_priority(priority.unwrap_or_default());
        self.send(envelope)
    }

    fn dispatch(&self, envelope: Envelope) {
        self.inner.history.write().record(envelope.clone());

        // Snapshot handlers, then invoke with no registry lock held so
        // handlers can re-enter the hub.
        let handlers = self.inner.subscriptions.read().matching_handlers(&envelope);
        for handler in &handlers {
            handler(&envelope);
        }

        self.inner
            .observers
            .notify(&HubEvent::now(HubEventKind::MessageSent {
                message_id: envelope.id,
                from: envelope.from.clone(),
                to: envelope.to.clone(),
                topic: envelope.topic.clone(),
                delivered: handlers.len(),
            }));
    }

    /// Send a message and await the first correlated reply.
    ///
    /// The reply's `correlation_id` equals the request envelope's id. On
    /// timeout the pending entry is removed before the call rejects with
    /// [`HubError::Timeout`].
    pub async fn request(
        &self,
        to: AgentAddress,
        topic: impl Into<String>,
        payload: Value,
        from: AgentAddress,
        timeout_after: Duration,
    ) -> Result<Envelope, HubError> {
        self.check_live()?;

        let envelope = Envelope::new(from.clone(), to, payload).with_topic(topic);
        let request_id = envelope.id;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner.pending_requests.insert(
            request_id,
            PendingRequest {
                requester: from,
                reply_tx,
            },
        );

        self.dispatch(envelope);

        match timeout(timeout_after, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                // Sender dropped without replying: hub destroyed.
                self.inner.pending_requests.remove(&request_id);
                Err(HubError::Destroyed)
            }
            Err(_) => {
                self.inner.pending_requests.remove(&request_id);
                Err(HubError::Timeout {
                    timeout: timeout_after,
                })
            }
        }
    }

    /// Route a reply to the waiter registered under `correlation_id`.
    ///
    /// With no matching waiter the reply is discarded and a
    /// `protocol-error` event is emitted.
    pub fn reply(
        &self,
        correlation_id: MessageId,
        from: AgentAddress,
        payload: Value,
    ) -> Result<(), HubError> {
        self.check_live()?;

        let Some((_, pending)) = self.inner.pending_requests.remove(&correlation_id) else {
            self.inner
                .observers
                .notify(&HubEvent::now(HubEventKind::ProtocolError {
                    reason: format!("reply without matching correlation {correlation_id}"),
                }));
            return Ok(());
        };

        let envelope = Envelope::new(from, pending.requester, payload)
            .with_kind(MessageKind::Reply)
            .with_correlation(correlation_id);
        self.inner.history.write().record(envelope.clone());
        let _ = pending.reply_tx.send(envelope);
        Ok(())
    }

    /// Register a handler for (address, topic). The `*` topic matches any
    /// topic. Returns the opaque id used for unsubscription.
    pub fn subscribe<F>(
        &self,
        address: AgentAddress,
        topic: impl Into<String>,
        handler: F,
    ) -> Result<SubscriptionId, HubError>
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.check_live()?;
        Ok(self
            .inner
            .subscriptions
            .write()
            .subscribe(address, topic, Arc::new(handler)))
    }

    /// Remove a subscription. Idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscriptions.write().unsubscribe(id)
    }

    /// Newest-first history read filtered by recipient address (or the
    /// broadcast sentinel for all) and optional topic.
    pub fn get_messages(&self, address: &AgentAddress, topic: Option<&str>) -> Vec<Envelope> {
        self.inner.history.read().get(address, topic)
    }

    /// Number of envelopes currently retained in history.
    pub fn history_len(&self) -> usize {
        self.inner.history.read().len()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.read().len()
    }

    // ------------------------------------------------------------------
    // Locks
    // ------------------------------------------------------------------

    /// Acquire the named advisory lock.
    ///
    /// Unheld resources are granted immediately; re-acquisition by the
    /// current holder is a no-op; otherwise the caller joins the FIFO
    /// queue and resumes when promoted. On timeout the waiter is removed
    /// from the queue before the call rejects with
    /// [`HubError::LockTimeout`].
    pub async fn acquire_lock(
        &self,
        resource: &str,
        holder: &AgentAddress,
        timeout_after: Option<Duration>,
    ) -> Result<(), HubError> {
        self.check_live()?;

        let outcome = self.inner.locks.lock().acquire(resource, holder);
        let (waiter_id, grant) = match outcome {
            AcquireOutcome::Granted => {
                self.inner
                    .observers
                    .notify(&HubEvent::now(HubEventKind::LockAcquired {
                        resource: resource.to_string(),
                        holder: holder.clone(),
                    }));
                return Ok(());
            }
            AcquireOutcome::Reentrant => return Ok(()),
            AcquireOutcome::Queued { waiter_id, grant } => (waiter_id, grant),
        };

        let granted = match timeout_after {
            Some(duration) => match timeout(duration, grant).await {
                Ok(result) => result.map(|()| true),
                Err(_) => Ok(false),
            },
            None => grant.await.map(|()| true),
        };

        match granted {
            Ok(true) => Ok(()),
            Ok(false) => {
                // Deadline expired. Promotion may have raced the timeout;
                // re-check ownership under the table guard.
                let won_race = {
                    let mut table = self.inner.locks.lock();
                    if table.holder(resource) == Some(holder) {
                        true
                    } else {
                        table.remove_waiter(resource, waiter_id);
                        false
                    }
                };
                if won_race {
                    return Ok(());
                }
                self.inner
                    .observers
                    .notify(&HubEvent::now(HubEventKind::LockTimeout {
                        resource: resource.to_string(),
                        waiter: holder.clone(),
                    }));
                Err(HubError::LockTimeout {
                    resource: resource.to_string(),
                    waiter: holder.clone(),
                })
            }
            Err(_) => Err(HubError::Destroyed),
        }
    }

    /// Release a lock held by `holder`. Only the current holder may
    /// release; returns whether the release happened. The FIFO head, if
    /// any, owns the lock before this method returns.
    pub fn release_lock(&self, resource: &str, holder: &AgentAddress) -> bool {
        let outcome = self.inner.locks.lock().release(resource, holder);
        match outcome {
            ReleaseOutcome::NotHolder => false,
            ReleaseOutcome::Released { promoted } => {
                self.inner
                    .observers
                    .notify(&HubEvent::now(HubEventKind::LockReleased {
                        resource: resource.to_string(),
                        holder: holder.clone(),
                    }));
                if let Some(next) = promoted {
                    self.inner
                        .observers
                        .notify(&HubEvent::now(HubEventKind::LockAcquired {
                            resource: resource.to_string(),
                            holder: next,
                        }));
                }
                true
            }
        }
    }

    /// Administratively revoke a lock, handing it to the queue head if
    /// one exists. Returns whether the lock existed.
    pub fn force_release_lock(&self, resource: &str) -> bool {
        let outcome = self.inner.locks.lock().force_release(resource);
        match outcome {
            None => false,
            Some(result) => {
                self.inner
                    .observers
                    .notify(&HubEvent::now(HubEventKind::LockForceReleased {
                        resource: resource.to_string(),
                        previous_holder: result.previous_holder,
                        new_holder: result.new_holder.clone(),
                    }));
                if let Some(next) = result.new_holder {
                    self.inner
                        .observers
                        .notify(&HubEvent::now(HubEventKind::LockAcquired {
                            resource: resource.to_string(),
                            holder: next,
                        }));
                }
                true
            }
        }
    }

    /// Snapshot of one lock's state.
    pub fn lock_info(&self, resource: &str) -> Option<LockInfo> {
        self.inner.locks.lock().info(resource)
    }

    /// Snapshot of every live lock, sorted by resource.
    pub fn active_locks(&self) -> Vec<LockInfo> {
        self.inner.locks.lock().all_info()
    }

    // ------------------------------------------------------------------
    // Collectors
    // ------------------------------------------------------------------

    /// Allocate a barrier awaiting `expected` named contributions.
    pub fn create_collector(&self, expected: usize) -> Result<Collector, HubError> {
        self.check_live()?;
        let collector = Collector::new(expected, self.inner.observers.clone());
        self.inner.collectors.insert(collector.id(), collector.clone());
        Ok(collector)
    }

    /// Drop the hub's handle to a collector. Idempotent.
    pub fn remove_collector(&self, id: CollectorId) -> bool {
        self.inner.collectors.remove(&id).is_some()
    }

    // ------------------------------------------------------------------
    // Deadlock detection
    // ------------------------------------------------------------------

    /// Detect every unique cycle in the current wait-for graph, emitting
    /// a `deadlock:detected` event per cycle.
    pub fn detect_deadlocks(&self) -> Vec<DeadlockInfo> {
        let snapshot = self.inner.locks.lock().snapshot();
        let cycles = detect_cycles(&snapshot);
        for cycle in &cycles {
            self.inner
                .observers
                .notify(&HubEvent::now(HubEventKind::DeadlockDetected {
                    cycle: cycle.cycle.clone(),
                    resources: cycle.resources.clone(),
                }));
        }
        cycles
    }

    /// Detect and break deadlock cycles, re-running detection after each
    /// pass, bounded by `max_resolution_passes`. Returns every cycle that
    /// was acted on.
    pub fn resolve_deadlocks(&self, strategy: ResolutionStrategy) -> Vec<DeadlockInfo> {
        let mut resolved = Vec::new();
        for _ in 0..self.inner.config.max_resolution_passes {
            let cycles = self.detect_deadlocks();
            if cycles.is_empty() {
                break;
            }
            for cycle in &cycles {
                let snapshot = self.inner.locks.lock().snapshot();
                if let Some(victim) = select_victim(cycle, &snapshot, strategy) {
                    self.force_release_lock(&victim);
                    self.inner
                        .observers
                        .notify(&HubEvent::now(HubEventKind::DeadlockResolved {
                            victim_resource: victim,
                        }));
                }
            }
            resolved.extend(cycles);
        }
        resolved
    }

    /// Start (or restart) the periodic deadlock sweep. Idempotent: any
    /// previously scheduled sweep is cancelled first.
    pub fn start_deadlock_scan(&self, interval: Duration, strategy: ResolutionStrategy) {
        let hub = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if hub.is_destroyed() {
                    break;
                }
                hub.resolve_deadlocks(strategy);
            }
        });

        let mut guard = self.inner.scan_task.lock();
        if let Some(previous) = guard.take() {
            previous.abort();
        }
        *guard = Some(handle);
    }

    /// Cancel the periodic deadlock sweep, if scheduled.
    pub fn stop_deadlock_scan(&self) {
        if let Some(handle) = self.inner.scan_task.lock().take() {
            handle.abort();
        }
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    /// Tear the hub down: clear subscriptions, cancel timers, and reject
    /// every pending request, lock wait, and collector with
    /// [`HubError::Destroyed`]. Idempotent.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.stop_deadlock_scan();
        self.inner.subscriptions.write().clear();

        // Dropping the reply senders wakes each pending requester with a
        // closed channel, which maps to HubError::Destroyed.
        self.inner.pending_requests.clear();

        // Dropping queued waiters' grant senders does the same for lock
        // waits.
        self.inner.locks.lock().clear();

        for entry in self.inner.collectors.iter() {
            entry.value().poison();
        }
        self.inner.collectors.clear();

        self.inner.observers.clear();
    }
}

impl Default for CommHub {
    fn default() -> Self {
        Self::new()
    }
}
