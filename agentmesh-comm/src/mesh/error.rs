//! Mesh error types.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::util::AgentAddress;

/// Errors surfaced by the mesh [`Router`](crate::mesh::Router).
#[derive(Debug, Error)]
pub enum MeshError {
    /// An ask did not receive a correlated reply within its deadline
    #[error("Ask timed out: target={target}, timeout={timeout:?}")]
    AskTimeout {
        /// The actor that did not respond
        target: AgentAddress,
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// An envelope could not be delivered
    ///
    /// Reasons mirror the router's undeliverable events: `"no route"`,
    /// `"expired"`, `"loop"`, `"mailbox full"`.
    #[error("Undeliverable: {reason}")]
    Undeliverable {
        /// Why delivery failed
        reason: String,
    },

    /// The operation raced with or followed router destruction
    #[error("Router shut down")]
    RouterShutdown,
}

impl MeshError {
    /// Whether this error indicates shutdown rather than a user-visible
    /// failure.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, MeshError::RouterShutdown)
    }
}

/// Errors surfaced by the [`AgentSystem`](crate::mesh::AgentSystem).
#[derive(Debug, Error)]
pub enum SystemError {
    /// An agent is already registered under this address
    #[error("Address already in use: {0}")]
    AddressInUse(AgentAddress),

    /// No agent is registered under this address
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentAddress),

    /// The system is shutting down and cannot accept new operations
    #[error("System shutdown in progress")]
    ShuttingDown,

    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Graceful shutdown did not finish within the configured timeout
    #[error("Shutdown timeout exceeded after {0:?}")]
    ShutdownTimeout(Duration),

    /// Underlying mesh failure
    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),
}
