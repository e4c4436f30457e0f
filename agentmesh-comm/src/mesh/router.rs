//! P2P router: address resolution, ask correlation, TTL and loop
//! enforcement, topic-based broadcast.

// Layer 1: Standard library imports
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;

// Layer 3: Internal module imports
use super::error::MeshError;
use crate::mailbox::{MailboxError, PriorityMailboxSender};
use crate::message::{Envelope, MessageKind, MessagePriority};
use crate::monitoring::{Observers, RouterEvent, RouterEventKind};
use crate::util::{AgentAddress, MessageId, ObserverId};

/// Options for `ask` and `tell` envelope construction.
#[derive(Debug, Clone)]
pub struct AskOptions {
    /// Deadline for the correlated reply.
    pub timeout: Duration,
    /// Mailbox priority of the outgoing envelope.
    pub priority: MessagePriority,
    /// Optional topic tag.
    pub topic: Option<String>,
    /// Optional time-to-live in milliseconds.
    pub ttl_ms: Option<u64>,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            priority: MessagePriority::Normal,
            topic: None,
            ttl_ms: None,
        }
    }
}

impl AskOptions {
    /// Set the reply deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the envelope priority.
    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the topic tag.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the time-to-live in milliseconds.
    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }
}

struct RouterInner {
    actors: DashMap<AgentAddress, PriorityMailboxSender>,
    topics: RwLock<HashMap<String, HashSet<AgentAddress>>>,
    pending_asks: DashMap<MessageId, oneshot::Sender<Envelope>>,
    observers: Observers<RouterEvent>,
    destroyed: AtomicBool,
}

/// Mesh router mediating all delivery between agents.
///
/// `route` is the single entry point: it validates expiry and loops,
/// intercepts correlated replies for outstanding asks, and enqueues into
/// priority mailboxes. Failures never propagate to the caller; they
/// surface as `undeliverable`/`expired` events.
///
/// # Clone Semantics
///
/// Cheap clone via `Arc`; all clones share the same routing state.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RouterInner {
                actors: DashMap::new(),
                topics: RwLock::new(HashMap::new()),
                pending_asks: DashMap::new(),
                observers: Observers::new(),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Whether `destroy` has run.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Register an observer for router events.
    pub fn observe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&RouterEvent) + Send + Sync + 'static,
    {
        self.inner.observers.observe(callback)
    }

    /// Remove an observer. Idempotent.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.inner.observers.unobserve(id)
    }

    /// Make an address routable. Returns false if already registered.
    pub fn add_actor(&self, address: AgentAddress, mailbox: PriorityMailboxSender) -> bool {
        if self.inner.actors.contains_key(&address) {
            return false;
        }
        self.inner.actors.insert(address, mailbox);
        true
    }

    /// Remove an address from the routing table and all topic sets.
    pub fn remove_actor(&self, address: &AgentAddress) -> bool {
        let removed = self.inner.actors.remove(address).is_some();
        if removed {
            let mut topics = self.inner.topics.write();
            for members in topics.values_mut() {
                members.remove(address);
            }
        }
        removed
    }

    /// Number of routable addresses.
    pub fn actor_count(&self) -> usize {
        self.inner.actors.len()
    }

    /// Subscribe an actor to topic-based broadcast delivery.
    pub fn subscribe(&self, actor: &AgentAddress, topic: impl Into<String>) {
        self.inner
            .topics
            .write()
            .entry(topic.into())
            .or_default()
            .insert(actor.clone());
    }

    /// Remove an actor's topic subscription. Idempotent.
    pub fn unsubscribe(&self, actor: &AgentAddress, topic: &str) -> bool {
        let mut topics = self.inner.topics.write();
        match topics.get_mut(topic) {
            Some(members) => {
                let removed = members.remove(actor);
                if members.is_empty() {
                    topics.remove(topic);
                }
                removed
            }
            None => false,
        }
    }

    /// Route an envelope: the single delivery entry point.
    ///
    /// Validation order: expiry, reply-correlation intercept, loop
    /// detection, then mailbox enqueue. Violations emit events and drop
    /// the envelope.
    pub fn route(&self, envelope: Envelope) {
        if self.is_destroyed() {
            self.emit_undeliverable(&envelope, "router shutdown");
            return;
        }

        if envelope.is_expired() {
            self.inner
                .observers
                .notify(&RouterEvent::now(RouterEventKind::Expired {
                    message_id: envelope.id,
                    age_ms: envelope.age_ms(),
                }));
            self.emit_undeliverable(&envelope, "expired");
            return;
        }

        // Correlated replies resolve outstanding asks instead of being
        // delivered as ordinary traffic.
        if matches!(envelope.kind, MessageKind::Reply | MessageKind::ErrorReply) {
            if let Some(correlation_id) = envelope.correlation_id {
                if let Some((_, reply_tx)) = self.inner.pending_asks.remove(&correlation_id) {
                    let message_id = envelope.id;
                    let to = envelope.to.clone();
                    let _ = reply_tx.send(envelope);
                    self.inner
                        .observers
                        .notify(&RouterEvent::now(RouterEventKind::Delivered {
                            message_id,
                            to,
                        }));
                    return;
                }
            }
        }

        if envelope.to.is_broadcast() {
            self.route_broadcast(envelope);
        } else {
            self.route_direct(envelope);
        }
    }

    fn route_direct(&self, envelope: Envelope) {
        if envelope.has_visited(&envelope.to) {
            self.emit_undeliverable(&envelope, "loop");
            return;
        }
        let to = envelope.to.clone();
        self.deliver(&to, envelope);
    }

    fn route_broadcast(&self, envelope: Envelope) {
        let recipients: Vec<AgentAddress> = match &envelope.topic {
            Some(topic) => {
                let topics = self.inner.topics.read();
                topics
                    .get(topic)
                    .map(|members| members.iter().cloned().collect())
                    .unwrap_or_default()
            }
            None => self
                .inner
                .actors
                .iter()
                .map(|entry| entry.key().clone())
                .collect(),
        };

        for recipient in recipients {
            if recipient == envelope.from || envelope.has_visited(&recipient) {
                continue;
            }
            let mut copy = envelope.clone();
            copy.to = recipient.clone();
            self.deliver(&recipient, copy);
        }
    }

    fn deliver(&self, to: &AgentAddress, envelope: Envelope) {
        let Some(mailbox) = self.inner.actors.get(to).map(|entry| entry.value().clone())
        else {
            self.emit_undeliverable(&envelope, "no route");
            return;
        };

        let message_id = envelope.id;
        let stamped = envelope.with_hop(to.clone());
        match mailbox.try_send(stamped) {
            Ok(()) => {
                self.inner
                    .observers
                    .notify(&RouterEvent::now(RouterEventKind::Delivered {
                        message_id,
                        to: to.clone(),
                    }));
            }
            Err(MailboxError::Full { .. }) => {
                self.inner
                    .observers
                    .notify(&RouterEvent::now(RouterEventKind::Undeliverable {
                        message_id,
                        to: to.clone(),
                        reason: "mailbox full".to_string(),
                    }));
            }
            Err(MailboxError::Closed) => {
                self.inner
                    .observers
                    .notify(&RouterEvent::now(RouterEventKind::Undeliverable {
                        message_id,
                        to: to.clone(),
                        reason: "no route".to_string(),
                    }));
            }
        }
    }

    fn emit_undeliverable(&self, envelope: &Envelope, reason: &str) {
        self.inner
            .observers
            .notify(&RouterEvent::now(RouterEventKind::Undeliverable {
                message_id: envelope.id,
                to: envelope.to.clone(),
                reason: reason.to_string(),
            }));
    }

    pub(crate) fn emit_behavior_error(&self, agent: &AgentAddress, error: String) {
        self.inner
            .observers
            .notify(&RouterEvent::now(RouterEventKind::BehaviorError {
                agent: agent.clone(),
                error,
            }));
    }

    /// Fire-and-forget send.
    pub fn tell(
        &self,
        from: AgentAddress,
        to: AgentAddress,
        payload: Value,
        options: AskOptions,
    ) -> Result<(), MeshError> {
        if self.is_destroyed() {
            return Err(MeshError::RouterShutdown);
        }
        let mut envelope = Envelope::new(from, to, payload).with_priority(options.priority);
        if let Some(topic) = options.topic {
            envelope = envelope.with_topic(topic);
        }
        if let Some(ttl_ms) = options.ttl_ms {
            envelope = envelope.with_ttl_ms(ttl_ms);
        }
        self.route(envelope);
        Ok(())
    }

    /// Send an `Ask` envelope and await its correlated reply.
    ///
    /// The reply may be a `Reply` or an `ErrorReply`; callers inspect the
    /// kind. On timeout the correlation entry is removed before the call
    /// rejects with [`MeshError::AskTimeout`].
    pub async fn ask(
        &self,
        from: AgentAddress,
        to: AgentAddress,
        payload: Value,
        options: AskOptions,
    ) -> Result<Envelope, MeshError> {
        if self.is_destroyed() {
            return Err(MeshError::RouterShutdown);
        }

        let mut envelope = Envelope::new(from, to.clone(), payload)
            .with_kind(MessageKind::Ask)
            .with_priority(options.priority);
        if let Some(topic) = options.topic {
            envelope = envelope.with_topic(topic);
        }
        if let Some(ttl_ms) = options.ttl_ms {
            envelope = envelope.with_ttl_ms(ttl_ms);
        }

        let ask_id = envelope.id;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner.pending_asks.insert(ask_id, reply_tx);

        self.route(envelope);

        match timeout(options.timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                self.inner.pending_asks.remove(&ask_id);
                Err(MeshError::RouterShutdown)
            }
            Err(_) => {
                self.inner.pending_asks.remove(&ask_id);
                Err(MeshError::AskTimeout {
                    target: to,
                    timeout: options.timeout,
                })
            }
        }
    }

    /// Tear the router down: clear all tables and reject outstanding asks
    /// with [`MeshError::RouterShutdown`]. Idempotent.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Dropping the reply senders wakes each pending ask with a closed
        // channel, which maps to RouterShutdown.
        self.inner.pending_asks.clear();
        self.inner.actors.clear();
        self.inner.topics.write().clear();
        self.inner.observers.clear();
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use crate::mailbox::PriorityMailbox;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn addr(name: &str) -> AgentAddress {
        AgentAddress::new(name)
    }

    fn undeliverable_counter(router: &Router, reason: &'static str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = Arc::clone(&count);
            router.observe(move |event| {
                if let RouterEventKind::Undeliverable { reason: r, .. } = &event.kind {
                    if r == reason {
                        count.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
        count
    }

    #[tokio::test]
    async fn test_direct_delivery_appends_hop() {
        let router = Router::new();
        let (mut mailbox, sender) = PriorityMailbox::new(10);
        router.add_actor(addr("b"), sender);

        router.route(Envelope::new(addr("a"), addr("b"), json!("hi")));

        let delivered = mailbox.recv().await.unwrap();
        assert_eq!(delivered.payload, json!("hi"));
        assert_eq!(delivered.hops, vec![addr("a"), addr("b")]);
    }

    #[tokio::test]
    async fn test_no_route_emits_undeliverable() {
        let router = Router::new();
        let count = undeliverable_counter(&router, "no route");

        router.route(Envelope::new(addr("a"), addr("ghost"), json!(null)));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loop_detection() {
        let router = Router::new();
        let (_mailbox, sender) = PriorityMailbox::new(10);
        router.add_actor(addr("b"), sender);
        let count = undeliverable_counter(&router, "loop");

        // The recipient is already in the hop trail.
        let envelope = Envelope::new(addr("a"), addr("b"), json!(null)).with_hop(addr("b"));
        router.route(envelope);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ttl_zero_expires_at_first_routing_decision() {
        let router = Router::new();
        let (_mailbox, sender) = PriorityMailbox::new(10);
        router.add_actor(addr("b"), sender);
        let count = undeliverable_counter(&router, "expired");

        let mut envelope = Envelope::new(addr("a"), addr("b"), json!(null)).with_ttl_ms(0);
        envelope.timestamp = chrono::Utc::now() - chrono::Duration::milliseconds(5);
        router.route(envelope);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mailbox_full_emits_undeliverable() {
        let router = Router::new();
        let (_mailbox, sender) = PriorityMailbox::new(1);
        router.add_actor(addr("b"), sender);
        let count = undeliverable_counter(&router, "mailbox full");

        router.route(Envelope::new(addr("a"), addr("b"), json!(1)));
        router.route(Envelope::new(addr("a"), addr("b"), json!(2)));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broadcast_topic_and_sender_exclusion() {
        let router = Router::new();
        let (mut mailbox_a, sender_a) = PriorityMailbox::new(10);
        let (mut mailbox_b, sender_b) = PriorityMailbox::new(10);
        let (mut mailbox_c, sender_c) = PriorityMailbox::new(10);
        router.add_actor(addr("a"), sender_a);
        router.add_actor(addr("b"), sender_b);
        router.add_actor(addr("c"), sender_c);
        router.subscribe(&addr("a"), "news");
        router.subscribe(&addr("b"), "news");

        router.route(Envelope::broadcast(addr("a"), json!("flash")).with_topic("news"));

        // b is subscribed and receives it; a is the sender; c is not
        // subscribed to the topic.
        assert_eq!(mailbox_b.recv().await.unwrap().payload, json!("flash"));
        assert!(mailbox_a.try_recv().is_err());
        assert!(mailbox_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_topicless_broadcast_reaches_all_but_sender() {
        let router = Router::new();
        let (mut mailbox_b, sender_b) = PriorityMailbox::new(10);
        let (mut mailbox_c, sender_c) = PriorityMailbox::new(10);
        let (_mailbox_a, sender_a) = PriorityMailbox::new(10);
        router.add_actor(addr("a"), sender_a);
        router.add_actor(addr("b"), sender_b);
        router.add_actor(addr("c"), sender_c);

        router.route(Envelope::broadcast(addr("a"), json!("all")));

        assert_eq!(mailbox_b.recv().await.unwrap().payload, json!("all"));
        assert_eq!(mailbox_c.recv().await.unwrap().payload, json!("all"));
    }

    #[tokio::test]
    async fn test_ask_resolved_by_correlated_reply() {
        let router = Router::new();
        let (mut mailbox_b, sender_b) = PriorityMailbox::new(10);
        router.add_actor(addr("b"), sender_b);

        let ask_task = {
            let router = router.clone();
            tokio::spawn(async move {
                router
                    .ask(addr("a"), addr("b"), json!("question"), AskOptions::default())
                    .await
            })
        };
        tokio::task::yield_now().await;

        let ask_envelope = mailbox_b.recv().await.unwrap();
        assert_eq!(ask_envelope.kind, MessageKind::Ask);
        router.route(Envelope::reply_to(&ask_envelope, addr("b"), json!("answer")));

        let reply = ask_task.await.unwrap().unwrap();
        assert_eq!(reply.payload, json!("answer"));
        assert_eq!(reply.correlation_id, Some(ask_envelope.id));
        assert_eq!(reply.to, addr("a"));
    }

    #[tokio::test]
    async fn test_ask_timeout_clears_correlation() {
        let router = Router::new();
        let (_mailbox, sender) = PriorityMailbox::new(10);
        router.add_actor(addr("b"), sender);

        let err = router
            .ask(
                addr("a"),
                addr("b"),
                json!(null),
                AskOptions::default().with_timeout(Duration::from_millis(20)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MeshError::AskTimeout { .. }));
        assert!(router.inner.pending_asks.is_empty());
    }

    #[tokio::test]
    async fn test_reply_without_pending_ask_delivers_normally() {
        let router = Router::new();
        let (mut mailbox_a, sender_a) = PriorityMailbox::new(10);
        router.add_actor(addr("a"), sender_a);

        let original = Envelope::new(addr("a"), addr("b"), json!("tell"));
        router.route(Envelope::reply_to(&original, addr("b"), json!("unsolicited")));

        let delivered = mailbox_a.recv().await.unwrap();
        assert_eq!(delivered.payload, json!("unsolicited"));
    }

    #[tokio::test]
    async fn test_destroy_rejects_outstanding_asks() {
        let router = Router::new();
        let (_mailbox, sender) = PriorityMailbox::new(10);
        router.add_actor(addr("b"), sender);

        let ask_task = {
            let router = router.clone();
            tokio::spawn(async move {
                router
                    .ask(addr("a"), addr("b"), json!(null), AskOptions::default())
                    .await
            })
        };
        tokio::task::yield_now().await;

        router.destroy();
        let err = ask_task.await.unwrap().unwrap_err();
        assert!(matches!(err, MeshError::RouterShutdown));

        // New asks fail fast.
        let err = router
            .ask(addr("a"), addr("b"), json!(null), AskOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MeshError::RouterShutdown));
    }

    #[tokio::test]
    async fn test_remove_actor_clears_topic_membership() {
        let router = Router::new();
        let (_mailbox, sender) = PriorityMailbox::new(10);
        router.add_actor(addr("b"), sender);
        router.subscribe(&addr("b"), "news");

        assert!(router.remove_actor(&addr("b")));
        assert!(!router.unsubscribe(&addr("b"), "news"));
        assert_eq!(router.actor_count(), 0);
    }
}
