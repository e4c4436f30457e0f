//! Message envelope, priority, and kind types shared by the hub and mesh.

pub mod envelope;
pub mod priority;

pub use envelope::{Envelope, MessageKind};
pub use priority::MessagePriority;
