// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Message priority levels for mailbox draining order.
///
/// Lower numeric value means more urgent: `Critical` (0) drains before
/// `Background` (4). Priority affects only per-agent mailbox ordering,
/// never hub dispatch order.
///
/// # Example
/// ```rust
/// use agentmesh_comm::message::MessagePriority;
///
/// assert!(MessagePriority::Critical.rank() < MessagePriority::High.rank());
/// assert!(MessagePriority::Normal.rank() < MessagePriority::Background.rank());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    /// Highest urgency, reserved for shutdown signals and health probes.
    Critical = 0,

    /// Time-sensitive operations that should pre-empt routine work.
    High = 1,

    /// Default priority for routine traffic.
    Normal = 2,

    /// Deferred work, drained after all routine traffic.
    Low = 3,

    /// Lowest urgency: cleanup, analytics, gossip chatter.
    Background = 4,
}

/// Number of distinct priority classes.
pub const PRIORITY_LEVELS: usize = 5;

impl MessagePriority {
    /// Numeric rank of this priority (0 = most urgent).
    pub fn rank(self) -> usize {
        self as usize
    }

    /// All priority classes in draining order, most urgent first.
    pub const ALL: [MessagePriority; PRIORITY_LEVELS] = [
        MessagePriority::Critical,
        MessagePriority::High,
        MessagePriority::Normal,
        MessagePriority::Low,
        MessagePriority::Background,
    ];

    /// Whether `self` is strictly more urgent than `other`.
    pub fn is_more_urgent_than(self, other: MessagePriority) -> bool {
        self.rank() < other.rank()
    }
}

impl Default for MessagePriority {
    fn default() -> Self {
        Self::Normal
    }
}
