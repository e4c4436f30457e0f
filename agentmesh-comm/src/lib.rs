//! # agentmesh-comm - Inter-Agent Communication Substrate
//!
//! Runtime fabric for a multi-agent coding assistant: independent agent
//! workers exchange typed envelopes, coordinate on shared resources, and
//! detect failures through two tightly-coupled subsystems sharing one
//! envelope shape, one request-reply discipline, and one observer model.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use agentmesh_comm::prelude::*;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = CommHub::new();
//!
//!     // A subscriber that answers requests on topic "review".
//!     let responder = hub.clone();
//!     hub.subscribe(AgentAddress::new("reviewer"), "review", move |envelope| {
//!         let _ = responder.reply(envelope.id, AgentAddress::new("reviewer"), json!("lgtm"));
//!     })?;
//!
//!     // Request-reply with correlation.
//!     let reply = hub
//!         .request(
//!             AgentAddress::new("reviewer"),
//!             "review",
//!             json!({"diff": "..."}),
//!             AgentAddress::new("planner"),
//!             Duration::from_secs(1),
//!         )
//!         .await?;
//!     assert_eq!(reply.payload, json!("lgtm"));
//!
//!     // Advisory locks with FIFO wait queues.
//!     hub.acquire_lock("workspace", &AgentAddress::new("planner"), None).await?;
//!     hub.release_lock("workspace", &AgentAddress::new("planner"));
//!
//!     hub.destroy();
//!     Ok(())
//! }
//! ```
//!
//! # Subsystems
//!
//! ## CommHub (centralized)
//! - Typed envelopes over pub/sub topics with a bounded history ring
//! - Request-reply with correlation ids and timeout discipline
//! - Advisory locks: single holder, FIFO wait queue, re-entrant no-op
//! - Barrier collectors awaiting N named contributions
//! - Deadlock detection over the lock wait-for graph with three victim
//!   strategies
//!
//! ## ActorSystem (mesh)
//! - Bounded priority mailboxes with urgency-based displacement
//! - A router enforcing TTL expiry and hop-trail loop detection
//! - Ask/reply correlation with typed timeouts
//! - SWIM-inspired gossip membership with suspicion-based failure
//!   detection
//!
//! ## Coordination patterns
//! - fan-out, pipeline, map-reduce, saga, bully election, gossip — all
//!   built on hub primitives
//!
//! # Delivery semantics
//!
//! At-most-once per subscription per envelope; synchronous fan-out inside
//! a single `send`; per-sender ordering to a given subscriber; no
//! cross-sender ordering. The core persists nothing and logs nothing:
//! every failure surfaces as a typed observer event.
//!
//! # Module Organization
//!
//! - [`message`] - Envelope, priority, and kind types
//! - [`hub`] - CommHub and its tables (subscriptions, history, locks,
//!   collectors, deadlock detection)
//! - [`mailbox`] - Bounded priority mailbox
//! - [`mesh`] - Router, agents, system, gossip membership
//! - [`patterns`] - Coordination patterns over the hub
//! - [`monitoring`] - Observer events and registries
//! - [`util`] - Identifier and address types

pub mod hub;
pub mod mailbox;
pub mod mesh;
pub mod message;
pub mod monitoring;
pub mod patterns;
pub mod util;

// Re-export commonly used types
pub use hub::{
    Collector, CommHub, DeadlockInfo, HubConfig, HubError, LockInfo, ResolutionStrategy,
};
pub use mailbox::{MailboxError, PriorityMailbox, PriorityMailboxSender};
pub use mesh::{
    AgentBehavior, AgentContext, AgentRef, AgentSystem, AskOptions, GossipConfig, GossipProtocol,
    MeshError, PeerStatus, PeerView, Router, SystemConfig, SystemError,
};
pub use message::{Envelope, MessageKind, MessagePriority};
pub use monitoring::{
    EventSeverity, GossipEvent, GossipEventKind, HubEvent, HubEventKind, ObservableEvent,
    Observers, RouterEvent, RouterEventKind,
};
pub use util::{AgentAddress, CollectorId, MessageId, ObserverId, SubscriptionId};

/// Convenience re-exports for embedding consumers.
pub mod prelude {
    pub use crate::hub::{Collector, CommHub, HubConfig, HubError, ResolutionStrategy};
    pub use crate::mesh::{
        AgentBehavior, AgentContext, AgentRef, AgentSystem, AskOptions, GossipConfig, MeshError,
        SystemConfig, SystemError,
    };
    pub use crate::message::{Envelope, MessageKind, MessagePriority};
    pub use crate::util::{AgentAddress, MessageId};
}
