// Layer 1: Standard library imports
use std::borrow::Borrow;
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Unique identifier for messages in the system.
///
/// # Collision Resistance
/// Uses UUID v4 (128-bit random), collision-resistant within a process
/// lifetime and opaque to consumers. Implements cheap copying.
///
/// # Example
/// ```rust
/// use agentmesh_comm::util::MessageId;
///
/// let id1 = MessageId::new();
/// let id2 = MessageId::new();
/// assert_ne!(id1, id2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a new random MessageId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create MessageId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle returned by `CommHub::subscribe`.
///
/// The subscriber holds this id and nothing else; unsubscription is
/// idempotent by id, so there is no back-pointer from the registry into
/// subscriber-owned state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generate a new random SubscriptionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle identifying a barrier collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectorId(Uuid);

impl CollectorId {
    /// Generate a new random CollectorId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CollectorId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CollectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle identifying a registered observer callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl ObserverId {
    /// Generate a new random ObserverId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of an agent for message routing.
///
/// Addresses are caller-chosen strings. The special sentinel `*` denotes
/// broadcast when used as a recipient and "any topic" when used in
/// subscription matching.
///
/// # Example
/// ```rust
/// use agentmesh_comm::util::AgentAddress;
///
/// let planner = AgentAddress::new("planner");
/// assert_eq!(planner.as_str(), "planner");
/// assert!(!planner.is_broadcast());
///
/// let everyone = AgentAddress::broadcast();
/// assert!(everyone.is_broadcast());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentAddress(String);

/// Sentinel address for broadcast delivery and wildcard topic matching.
pub const BROADCAST: &str = "*";

impl AgentAddress {
    /// Create an address from a caller-chosen name.
    ///
    /// An empty name is not a valid sender address; envelope construction
    /// asserts non-emptiness in debug builds.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The broadcast sentinel address `*`.
    pub fn broadcast() -> Self {
        Self(BROADCAST.to_string())
    }

    /// Whether this address is the broadcast sentinel.
    pub fn is_broadcast(&self) -> bool {
        self.0 == BROADCAST
    }

    /// View the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentAddress {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for AgentAddress {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl Borrow<str> for AgentAddress {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_uniqueness() {
        let id1 = MessageId::new();
        let id2 = MessageId::new();

        assert_ne!(id1, id2);
    }

    #[test]
    fn test_message_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = MessageId::from_uuid(uuid);

        assert_eq!(id.as_uuid(), &uuid);
    }

    #[test]
    fn test_message_id_display() {
        let id = MessageId::new();
        let display = format!("{id}");

        assert!(!display.is_empty());
        assert!(display.contains('-')); // UUID format
    }

    #[test]
    fn test_subscription_id_uniqueness() {
        assert_ne!(SubscriptionId::new(), SubscriptionId::new());
    }

    #[test]
    fn test_collector_id_default() {
        let id = CollectorId::default();
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_address_basic() {
        let addr = AgentAddress::new("coder");

        assert_eq!(addr.as_str(), "coder");
        assert!(!addr.is_broadcast());
        assert_eq!(format!("{addr}"), "coder");
    }

    #[test]
    fn test_address_broadcast_sentinel() {
        let addr = AgentAddress::broadcast();

        assert!(addr.is_broadcast());
        assert_eq!(addr.as_str(), BROADCAST);
    }

    #[test]
    fn test_address_equality_by_name() {
        // Unlike UUID-backed ids, two addresses with the same name are the
        // same routing destination.
        assert_eq!(AgentAddress::new("a"), AgentAddress::from("a"));
        assert_ne!(AgentAddress::new("a"), AgentAddress::new("b"));
    }

    #[test]
    fn test_address_from_string() {
        let addr: AgentAddress = String::from("reviewer").into();
        assert_eq!(addr.as_str(), "reviewer");
    }
}
