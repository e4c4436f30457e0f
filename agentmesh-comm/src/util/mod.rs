//! Shared identifier and address types.

pub mod ids;

pub use ids::{AgentAddress, CollectorId, MessageId, ObserverId, SubscriptionId, BROADCAST};
