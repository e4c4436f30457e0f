//! Concrete event types emitted by the hub, the mesh router, and the
//! gossip protocol.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::Serialize;

// Layer 3: Internal module imports
use super::traits::{EventSeverity, ObservableEvent};
use crate::util::{AgentAddress, CollectorId, MessageId};

// ============================================================================
// Hub Events
// ============================================================================

/// Event emitted by a [`CommHub`](crate::hub::CommHub).
#[derive(Debug, Clone, Serialize)]
pub struct HubEvent {
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,

    /// Specific hub event
    pub kind: HubEventKind,
}

impl HubEvent {
    /// Create an event stamped with the current time.
    pub fn now(kind: HubEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }
}

impl ObservableEvent for HubEvent {
    const EVENT_TYPE: &'static str = "hub";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.kind {
            HubEventKind::MessageSent { .. } => EventSeverity::Debug,
            HubEventKind::LockAcquired { .. } | HubEventKind::LockReleased { .. } => {
                EventSeverity::Info
            }
            HubEventKind::LockTimeout { .. } | HubEventKind::CollectorTimeout { .. } => {
                EventSeverity::Warning
            }
            HubEventKind::LockForceReleased { .. } => EventSeverity::Warning,
            HubEventKind::CollectorComplete { .. } => EventSeverity::Info,
            HubEventKind::DeadlockDetected { .. } => EventSeverity::Error,
            HubEventKind::DeadlockResolved { .. } => EventSeverity::Warning,
            HubEventKind::ProtocolError { .. } => EventSeverity::Warning,
        }
    }
}

/// Specific types of hub events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum HubEventKind {
    /// An envelope was dispatched to subscribers and recorded in history
    MessageSent {
        /// Id of the dispatched envelope
        message_id: MessageId,
        /// Sender address
        from: AgentAddress,
        /// Recipient address (may be the broadcast sentinel)
        to: AgentAddress,
        /// Topic, if any
        topic: Option<String>,
        /// Number of subscriptions the envelope was handed to
        delivered: usize,
    },

    /// A lock was granted to a holder
    LockAcquired {
        /// Resource name
        resource: String,
        /// New holder
        holder: AgentAddress,
    },

    /// A lock was released by its holder
    LockReleased {
        /// Resource name
        resource: String,
        /// Previous holder
        holder: AgentAddress,
    },

    /// A waiter gave up before reaching the head of the queue
    LockTimeout {
        /// Resource name
        resource: String,
        /// Waiter that timed out
        waiter: AgentAddress,
    },

    /// A lock was administratively revoked
    LockForceReleased {
        /// Resource name
        resource: String,
        /// Holder whose contract was cancelled
        previous_holder: AgentAddress,
        /// Waiter promoted to holder, if the queue was non-empty
        new_holder: Option<AgentAddress>,
    },

    /// A collector received its final expected contribution
    CollectorComplete {
        /// Collector id
        collector_id: CollectorId,
        /// Number of expected contributions
        expected: usize,
    },

    /// A collector's latch timed out before completion
    CollectorTimeout {
        /// Collector id
        collector_id: CollectorId,
        /// Contributions received before the deadline
        received: usize,
        /// Number of expected contributions
        expected: usize,
    },

    /// The wait-for graph contains a cycle
    DeadlockDetected {
        /// Addresses forming the cycle
        cycle: Vec<AgentAddress>,
        /// Resources linking cycle members
        resources: Vec<String>,
    },

    /// A deadlock cycle was broken by force-releasing a victim resource
    DeadlockResolved {
        /// The force-released resource
        victim_resource: String,
    },

    /// A correlated reply arrived with no matching waiter (discarded)
    ProtocolError {
        /// Human-readable reason
        reason: String,
    },
}

// ============================================================================
// Router Events
// ============================================================================

/// Event emitted by the mesh [`Router`](crate::mesh::Router).
#[derive(Debug, Clone, Serialize)]
pub struct RouterEvent {
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,

    /// Specific router event
    pub kind: RouterEventKind,
}

impl RouterEvent {
    /// Create an event stamped with the current time.
    pub fn now(kind: RouterEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }
}

impl ObservableEvent for RouterEvent {
    const EVENT_TYPE: &'static str = "router";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.kind {
            RouterEventKind::Delivered { .. } => EventSeverity::Debug,
            RouterEventKind::Expired { .. } => EventSeverity::Warning,
            RouterEventKind::Undeliverable { .. } => EventSeverity::Warning,
            RouterEventKind::BehaviorError { .. } => EventSeverity::Error,
        }
    }
}

/// Specific types of router events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum RouterEventKind {
    /// An envelope reached a mailbox
    Delivered {
        /// Id of the delivered envelope
        message_id: MessageId,
        /// Recipient
        to: AgentAddress,
    },

    /// An envelope was dropped before delivery
    Undeliverable {
        /// Id of the dropped envelope
        message_id: MessageId,
        /// Intended recipient
        to: AgentAddress,
        /// Drop reason: `"expired"`, `"loop"`, `"no route"`, `"mailbox full"`
        reason: String,
    },

    /// An envelope outlived its TTL at a routing decision
    Expired {
        /// Id of the expired envelope
        message_id: MessageId,
        /// Envelope age at the drop, in milliseconds
        age_ms: i64,
    },

    /// An agent behavior returned an error while handling an envelope
    BehaviorError {
        /// The agent whose behavior failed
        agent: AgentAddress,
        /// Stringified behavior error
        error: String,
    },
}

// ============================================================================
// Gossip Events
// ============================================================================

/// Event emitted by the [`GossipProtocol`](crate::mesh::GossipProtocol).
#[derive(Debug, Clone, Serialize)]
pub struct GossipEvent {
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,

    /// Specific gossip event
    pub kind: GossipEventKind,
}

impl GossipEvent {
    /// Create an event stamped with the current time.
    pub fn now(kind: GossipEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }
}

impl ObservableEvent for GossipEvent {
    const EVENT_TYPE: &'static str = "gossip";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.kind {
            GossipEventKind::PeerDiscovered { .. } => EventSeverity::Info,
            GossipEventKind::PeerSuspect { .. } => EventSeverity::Warning,
            GossipEventKind::PeerDead { .. } => EventSeverity::Error,
        }
    }
}

/// Specific types of gossip events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum GossipEventKind {
    /// A previously unknown peer entered the view
    PeerDiscovered {
        /// Peer address
        peer: AgentAddress,
    },

    /// A peer missed its heartbeat window
    PeerSuspect {
        /// Peer address
        peer: AgentAddress,
        /// Generation after the transition
        generation: u64,
    },

    /// A suspect peer exceeded the dead timeout
    PeerDead {
        /// Peer address
        peer: AgentAddress,
        /// Generation after the transition
        generation: u64,
    },
}
