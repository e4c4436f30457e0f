//! Coordination pattern error types.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::hub::HubError;

/// Errors surfaced by coordination patterns.
#[derive(Debug, Error)]
pub enum PatternError {
    /// A hub primitive failed underneath the pattern
    #[error(transparent)]
    Hub(#[from] HubError),

    /// A saga step failed; completed steps were compensated in reverse
    #[error(
        "Saga aborted at step '{step}': {source_message} ({compensation_failures} compensation {})",
        if *.compensation_failures == 1 { "error" } else { "errors" }
    )]
    SagaAborted {
        /// Name of the failing step
        step: String,
        /// Stringified failure of that step
        source_message: String,
        /// Number of compensations that themselves failed
        compensation_failures: usize,
    },

    /// An election was started with no candidates
    #[error("Election requires at least one candidate")]
    NoCandidates,
}
