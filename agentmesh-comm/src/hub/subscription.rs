//! Subscription registry mapping (address, topic) pairs to handlers.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::message::Envelope;
use crate::util::{AgentAddress, SubscriptionId, BROADCAST};

/// Handler invoked synchronously for every matching envelope.
///
/// Handlers may re-enter the hub (e.g. to `reply`); the hub releases the
/// registry lock before invoking them.
pub type SubscriptionHandler = Arc<dyn Fn(&Envelope) + Send + Sync>;

struct SubscriptionEntry {
    id: SubscriptionId,
    address: AgentAddress,
    topic: String,
    handler: SubscriptionHandler,
}

/// Registry of subscriptions owned by a hub.
///
/// Delivery rules:
/// - A message to a concrete address reaches every subscription whose
///   address equals the recipient and whose topic matches (the `*` topic
///   matches any).
/// - A broadcast reaches every topic-matching subscription across all
///   addresses, excluding the sender's own subscriptions.
///
/// Duplicate (address, topic, handler) triples are tolerated; each
/// registration is an independent subscription. The registry is not
/// internally synchronized; the owning hub guards it.
pub struct SubscriptionRegistry {
    entries: Vec<SubscriptionEntry>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a handler for (address, topic). Returns the opaque id the
    /// subscriber needs for unsubscription.
    pub fn subscribe(
        &mut self,
        address: AgentAddress,
        topic: impl Into<String>,
        handler: SubscriptionHandler,
    ) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.entries.push(SubscriptionEntry {
            id,
            address,
            topic: topic.into(),
            handler,
        });
        id
    }

    /// Remove a subscription by id. Idempotent.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Handlers matching an envelope, in registration order.
    pub fn matching_handlers(&self, envelope: &Envelope) -> Vec<SubscriptionHandler> {
        self.entries
            .iter()
            .filter(|entry| {
                let topic_match = entry.topic == BROADCAST
                    || envelope.topic.as_deref() == Some(entry.topic.as_str());
                if !topic_match {
                    return false;
                }
                if envelope.to.is_broadcast() {
                    // Self-exclude on broadcast.
                    entry.address != envelope.from
                } else {
                    entry.address == envelope.to
                }
            })
            .map(|entry| Arc::clone(&entry.handler))
            .collect()
    }

    /// Total number of registered subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every subscription.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
