//! Peer view entries for the gossip membership table.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::util::AgentAddress;

/// Liveness status of a peer.
///
/// Transitions move forward through `Alive -> Suspect -> Dead` during
/// sweeps; only a generation-bumping register or merge can move a peer
/// back to `Alive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    /// Heartbeats observed within the suspect window.
    Alive,
    /// Silence exceeded the suspect threshold.
    Suspect,
    /// Silence exceeded the dead threshold.
    Dead,
}

/// One peer's view entry in the membership table.
///
/// The generation is a monotone counter: any remote view with a strictly
/// greater generation replaces the local one during a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerView {
    /// Peer address.
    pub id: AgentAddress,
    /// Advertised expertise tags.
    pub expertise: Vec<String>,
    /// Advertised capabilities.
    pub capabilities: Vec<String>,
    /// Current liveness status.
    pub status: PeerStatus,
    /// Monotone view generation.
    pub generation: u64,
    /// Last time this peer was heard from.
    pub last_seen: DateTime<Utc>,
}

impl PeerView {
    /// Create a fresh alive view at the given generation.
    pub fn alive(
        id: AgentAddress,
        expertise: Vec<String>,
        capabilities: Vec<String>,
        generation: u64,
    ) -> Self {
        Self {
            id,
            expertise,
            capabilities,
            status: PeerStatus::Alive,
            generation,
            last_seen: Utc::now(),
        }
    }

    /// Whether this peer advertises an expertise tag.
    pub fn has_expertise(&self, tag: &str) -> bool {
        self.expertise.iter().any(|t| t == tag)
    }
}
