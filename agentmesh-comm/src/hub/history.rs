//! Bounded message history ring.

// Layer 1: Standard library imports
use std::collections::VecDeque;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::message::Envelope;
use crate::util::AgentAddress;

/// Ring buffer retaining the most recent envelopes seen by a hub.
///
/// The oldest envelope is evicted once capacity is reached. Reads are
/// newest-first. The ring is not internally synchronized; the owning hub
/// guards it.
pub struct MessageHistory {
    ring: VecDeque<Envelope>,
    capacity: usize,
}

impl MessageHistory {
    /// Create an empty ring with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Record an envelope, evicting the oldest when full.
    pub fn record(&mut self, envelope: Envelope) {
        if self.capacity == 0 {
            return;
        }
        if self.ring.len() == self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(envelope);
    }

    /// Newest-first read filtered by recipient address and optional topic.
    ///
    /// The broadcast sentinel as `address` matches every envelope; a
    /// concrete address also matches broadcast envelopes, since the
    /// subscriber would have received those.
    pub fn get(&self, address: &AgentAddress, topic: Option<&str>) -> Vec<Envelope> {
        self.ring
            .iter()
            .rev()
            .filter(|envelope| {
                let address_match = address.is_broadcast()
                    || envelope.to == *address
                    || envelope.to.is_broadcast();
                let topic_match = match topic {
                    Some(topic) => envelope.topic.as_deref() == Some(topic),
                    None => true,
                };
                address_match && topic_match
            })
            .cloned()
            .collect()
    }

    /// Number of retained envelopes.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
