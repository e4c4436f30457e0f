//! Centralized message hub: typed envelopes over pub/sub topics,
//! request-reply with correlation ids, advisory locks with FIFO wait
//! queues, barrier collectors, and deadlock detection over the lock
//! wait-for graph.
//!
//! # Components
//!
//! - [`CommHub`] - The hub itself; composes everything below
//! - [`SubscriptionRegistry`] - (address, topic) -> handler bindings
//! - [`MessageHistory`] - Bounded newest-first envelope ring
//! - [`Collector`] - Barrier awaiting N named contributions
//! - [`DeadlockInfo`] / [`ResolutionStrategy`] - Cycle reports and victim
//!   selection for the wait-for graph detector
//! - [`HubConfig`] - Configuration with builder and validation
//! - [`HubError`] - Tagged error taxonomy
//!
//! # Delivery guarantees
//!
//! At-most-once per subscription per envelope; synchronous fan-out within
//! a single `send`; priority affects only mailbox draining in the mesh,
//! never hub dispatch order.

pub mod collector;
pub mod comm_hub;
pub mod config;
pub mod deadlock;
pub mod error;
pub mod history;
pub mod lock;
pub mod subscription;

pub use collector::Collector;
pub use comm_hub::CommHub;
pub use config::{HubConfig, HubConfigBuilder, DEFAULT_HISTORY_CAPACITY};
pub use deadlock::{DeadlockInfo, ResolutionStrategy};
pub use error::HubError;
pub use history::MessageHistory;
pub use lock::LockInfo;
pub use subscription::{SubscriptionHandler, SubscriptionRegistry};
