//! Per-agent bounded priority mailbox.
//!
//! Messages drain in priority order (rank 0 first) with insertion-order
//! tie-breaks. When the mailbox is full, an incoming message that is
//! strictly more urgent than the weakest queued message displaces it;
//! otherwise the incoming message is rejected.
//!
//! # Components
//!
//! - [`PriorityMailbox`] - Receiver half, owned by exactly one agent
//! - [`PriorityMailboxSender`] - Cloneable sender half used by the router
//! - [`MailboxMetrics`] - Atomic counters for observability
//! - [`MailboxError`] / [`TryRecvError`] - Error types

pub mod error;
pub mod metrics;
pub mod priority;

pub use error::{MailboxError, TryRecvError};
pub use metrics::MailboxMetrics;
pub use priority::{PriorityMailbox, PriorityMailboxSender};
