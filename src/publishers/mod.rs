//! Publishers: per-type and sharded queues with their dispatch loops.
//!
//! ## Contents
//! - [`EventPublisher`], [`PublisherFactory`] contracts the bus routes through
//! - [`DefaultPublisher`] one event type, one queue, one task
//! - [`ShardedPublisher`] many event types multiplexed onto one queue/task
//!
//! Internal modules:
//! - `engine`: queue, grace wait, dispatch loop, watermark, callback isolation;
//! - `roster`: concurrent subscriber set and per-type table.

mod default;
mod engine;
mod publisher;
mod roster;
mod sharded;

pub use default::{DefaultPublisher, DefaultPublisherFactory};
pub use publisher::{EventPublisher, PublisherFactory};
pub use sharded::{ShardedPublisher, ShardedPublisherFactory};
