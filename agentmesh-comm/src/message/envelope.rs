// Layer 1: Standard library imports
use std::fmt::Debug;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use super::priority::MessagePriority;
use crate::util::{AgentAddress, MessageId};

/// Delivery contract of an envelope.
///
/// Hub traffic uses `Tell` and `Reply`; the mesh router additionally uses
/// `Ask` (expects a correlated reply) and `ErrorReply` (correlated
/// failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    /// Fire-and-forget.
    Tell,
    /// Expects a correlated reply.
    Ask,
    /// Correlated response to an `Ask` or hub request.
    Reply,
    /// Correlated failure response.
    ErrorReply,
}

/// Immutable message record shared by the hub and the mesh.
///
/// An envelope is constructed once at the sender and never mutated; the
/// builder methods consume and return the value. The payload is opaque
/// JSON: the core moves it but never inspects its shape.
///
/// # Example
/// ```rust
/// use agentmesh_comm::message::{Envelope, MessagePriority};
/// use agentmesh_comm::util::AgentAddress;
/// use serde_json::json;
///
/// let envelope = Envelope::new(
///     AgentAddress::new("planner"),
///     AgentAddress::new("coder"),
///     json!({"task": "implement"}),
/// )
/// .with_topic("tasks")
/// .with_priority(MessagePriority::High)
/// .with_ttl_ms(30_000);
///
/// assert_eq!(envelope.topic.as_deref(), Some("tasks"));
/// assert!(!envelope.is_expired());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique envelope identifier, generated at creation.
    pub id: MessageId,

    /// Sender address. Never empty.
    pub from: AgentAddress,

    /// Recipient address, or the broadcast sentinel `*`.
    pub to: AgentAddress,

    /// Optional topic for pub/sub dispatch.
    pub topic: Option<String>,

    /// Delivery contract.
    pub kind: MessageKind,

    /// Opaque application payload.
    pub payload: Value,

    /// Mailbox-draining priority.
    pub priority: MessagePriority,

    /// Id of the envelope being answered; present on every
    /// `Reply`/`ErrorReply`.
    pub correlation_id: Option<MessageId>,

    /// Creation timestamp.
    pub timestamp: DateTime<Utc>,

    /// Relative expiry in milliseconds from `timestamp`.
    pub ttl_ms: Option<u64>,

    /// Addresses traversed so far; used for loop detection.
    pub hops: Vec<AgentAddress>,
}

impl Envelope {
    /// Create a new `Tell` envelope with normal priority.
    ///
    /// The sender is recorded as the first hop.
    pub fn new(from: AgentAddress, to: AgentAddress, payload: Value) -> Self {
        debug_assert!(!from.as_str().is_empty(), "sender address must not be empty");
        let hops = vec![from.clone()];
        Self {
            id: MessageId::new(),
            from,
            to,
            topic: None,
            kind: MessageKind::Tell,
            payload,
            priority: MessagePriority::Normal,
            correlation_id: None,
            timestamp: Utc::now(),
            ttl_ms: None,
            hops,
        }
    }

    /// Create a broadcast envelope (`to = *`).
    pub fn broadcast(from: AgentAddress, payload: Value) -> Self {
        Self::new(from, AgentAddress::broadcast(), payload)
    }

    /// Construct a `Reply` answering `original`.
    ///
    /// The correlation id is always the original envelope's id and the
    /// recipient is always the original sender, so a reply cannot exist
    /// without its correlation.
    pub fn reply_to(original: &Envelope, from: AgentAddress, payload: Value) -> Self {
        Self::new(from, original.from.clone(), payload)
            .with_kind(MessageKind::Reply)
            .with_correlation(original.id)
    }

    /// Construct an `ErrorReply` answering `original`.
    pub fn error_reply_to(original: &Envelope, from: AgentAddress, payload: Value) -> Self {
        Self::new(from, original.from.clone(), payload)
            .with_kind(MessageKind::ErrorReply)
            .with_correlation(original.id)
    }

    /// Builder method: set the topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Builder method: set the delivery kind.
    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Builder method: set the priority.
    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder method: set the correlation id.
    pub fn with_correlation(mut self, id: MessageId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Builder method: set the time-to-live in milliseconds.
    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    /// Builder method: append an address to the hop trail.
    pub fn with_hop(mut self, hop: AgentAddress) -> Self {
        self.hops.push(hop);
        self
    }

    /// Whether `addr` already appears in the hop trail.
    pub fn has_visited(&self, addr: &AgentAddress) -> bool {
        self.hops.contains(addr)
    }

    /// Whether the envelope's age exceeds its TTL.
    ///
    /// Envelopes without a TTL never expire. A TTL of zero expires at the
    /// first routing decision after the sender's timestamp.
    pub fn is_expired(&self) -> bool {
        match self.ttl_ms {
            Some(ttl_ms) => self.age_ms() > i64::try_from(ttl_ms).unwrap_or(i64::MAX),
            None => false,
        }
    }

    /// Milliseconds elapsed since creation.
    pub fn age_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.timestamp)
            .num_milliseconds()
    }
}
