//! Observer infrastructure for hub, router, and gossip events.
//!
//! The core never logs; every failure and state transition is surfaced as
//! a typed event delivered synchronously to registered observers. Observer
//! callbacks must complete quickly and must not reach back into the
//! component that emitted the event.
//!
//! # Components
//!
//! - [`ObservableEvent`] - Trait implemented by all event types
//! - [`EventSeverity`] - Severity levels for observer-side filtering
//! - [`Observers`] - Registry delivering events with panic isolation
//! - [`HubEvent`] / [`RouterEvent`] / [`GossipEvent`] - Concrete events

pub mod observers;
pub mod traits;
pub mod types;

pub use observers::Observers;
pub use traits::{EventSeverity, ObservableEvent};
pub use types::{
    GossipEvent, GossipEventKind, HubEvent, HubEventKind, RouterEvent, RouterEventKind,
};
