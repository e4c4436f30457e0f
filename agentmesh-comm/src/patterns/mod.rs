//! Distributed coordination patterns built entirely on
//! [`CommHub`](crate::hub::CommHub) primitives.
//!
//! Every pattern takes a timeout; partial-failure policies differ per
//! pattern and are documented on each function.
//!
//! # Patterns
//!
//! - [`fan_out`] - Parallel requests gathered through a barrier;
//!   partial-failure tolerant
//! - [`pipeline`] - Sequential fold; no partial success
//! - [`map_reduce`] - Contiguous chunking, mapper fan-out, single reducer
//! - [`saga`] - Sequential steps with reverse-order compensation
//! - [`election`] - Bully election by candidate index
//! - [`gossip`] - Epidemic-style low-priority fan-out to known peers

pub mod election;
pub mod error;
pub mod fan_out;
pub mod gossip;
pub mod map_reduce;
pub mod pipeline;
pub mod saga;

pub use election::election;
pub use error::PatternError;
pub use fan_out::fan_out;
pub use gossip::gossip;
pub use map_reduce::map_reduce;
pub use pipeline::{pipeline, PipelineStage};
pub use saga::{saga, Compensation, SagaStep};
