//! P2P agent mesh: priority mailboxes behind a routing layer, ask/reply
//! correlation, and SWIM-inspired gossip membership.
//!
//! # Components
//!
//! - [`Router`] - Address resolution, TTL/loop enforcement, ask
//!   correlation, topic broadcast
//! - [`AgentBehavior`] / [`AgentContext`] - Cooperative message-handling
//!   loop, one envelope at a time per agent
//! - [`AgentSystem`] / [`AgentRef`] / [`SpawnBuilder`] - Lifecycle wiring
//! - [`GossipProtocol`] / [`PeerView`] / [`PeerStatus`] - Membership and
//!   failure detection
//! - [`SystemConfig`] / [`GossipConfig`] - Configuration
//! - [`MeshError`] / [`SystemError`] - Tagged error taxonomies

pub mod agent;
pub mod config;
pub mod error;
pub mod gossip;
pub mod peer;
pub mod router;
pub mod system;

pub use agent::{AgentBehavior, AgentContext};
pub use config::{
    GossipConfig, GossipConfigBuilder, SystemConfig, SystemConfigBuilder,
    DEFAULT_GOSSIP_FANOUT, DEFAULT_GOSSIP_INTERVAL, DEFAULT_MAILBOX_CAPACITY,
};
pub use error::{MeshError, SystemError};
pub use gossip::GossipProtocol;
pub use peer::{PeerStatus, PeerView};
pub use router::{AskOptions, Router};
pub use system::{AgentRef, AgentSystem, SpawnBuilder};
