//! Hub error types.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::util::{AgentAddress, CollectorId};

/// Errors surfaced by [`CommHub`](crate::hub::CommHub) operations.
///
/// Only tagged discriminants cross the interface boundary; no stack
/// traces. Timeout variants are returned strictly after the associated
/// pending-state entry has been removed, so a late arrival can never
/// signal a caller twice.
///
/// # Example
/// ```rust
/// use agentmesh_comm::hub::HubError;
/// use std::time::Duration;
///
/// let err = HubError::Timeout { timeout: Duration::from_secs(1) };
/// assert!(err.is_timeout());
/// assert!(!err.is_shutdown());
/// ```
#[derive(Debug, Error)]
pub enum HubError {
    /// A request did not receive a correlated reply within its deadline
    #[error("Request timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// A lock waiter gave up before reaching the head of the queue
    #[error("Lock acquisition timed out: resource={resource}, waiter={waiter}")]
    LockTimeout {
        /// The contended resource
        resource: String,
        /// The waiter that timed out
        waiter: AgentAddress,
    },

    /// A collector latch timed out before all contributions arrived
    #[error("Collector {collector_id} timed out: {received}/{expected} contributions")]
    CollectorTimeout {
        /// The collector that timed out
        collector_id: CollectorId,
        /// Contributions received before the deadline
        received: usize,
        /// Number of expected contributions
        expected: usize,
    },

    /// The operation raced with or followed `destroy`
    #[error("Hub destroyed")]
    Destroyed,
}

impl HubError {
    /// Whether this error is a deadline expiry of any kind.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            HubError::Timeout { .. }
                | HubError::LockTimeout { .. }
                | HubError::CollectorTimeout { .. }
        )
    }

    /// Whether this error indicates hub shutdown rather than a
    /// user-visible failure.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, HubError::Destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = HubError::Timeout {
            timeout: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("timed out"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_lock_timeout_display() {
        let err = HubError::LockTimeout {
            resource: "repo".to_string(),
            waiter: AgentAddress::new("coder"),
        };
        let msg = err.to_string();
        assert!(msg.contains("repo"));
        assert!(msg.contains("coder"));
    }

    #[test]
    fn test_destroyed_classification() {
        assert!(HubError::Destroyed.is_shutdown());
        assert!(!HubError::Destroyed.is_timeout());
    }
}
