//! Mailbox error types.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Errors surfaced by mailbox enqueue operations.
///
/// Capacity violations surface at enqueue time so the router can emit an
/// `undeliverable("mailbox full")` event instead of blocking.
#[derive(Debug, Error)]
pub enum MailboxError {
    /// Mailbox is full and the incoming message was not urgent enough to
    /// displace anything
    #[error("Mailbox is full (capacity: {capacity})")]
    Full {
        /// Configured mailbox capacity
        capacity: usize,
    },

    /// Mailbox is closed (agent stopped)
    #[error("Mailbox is closed")]
    Closed,
}

/// Errors for non-blocking receive operations.
#[derive(Debug, Error)]
pub enum TryRecvError {
    /// No messages available
    #[error("Mailbox is empty")]
    Empty,

    /// Mailbox is closed and fully drained
    #[error("Mailbox is closed")]
    Closed,
}
