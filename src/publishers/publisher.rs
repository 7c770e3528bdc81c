//! # Publisher and factory contracts.
//!
//! [`EventPublisher`] is what the [`Bus`](crate::Bus) routes to; a
//! [`PublisherFactory`] decides which publisher instance serves a given
//! [`EventType`] when the bus needs one.
//!
//! | Factory                     | Instances                        | Publisher           |
//! |-----------------------------|----------------------------------|---------------------|
//! | [`DefaultPublisherFactory`] | one per event type               | [`DefaultPublisher`]|
//! | [`ShardedPublisherFactory`] | one per shard key, shared by types| [`ShardedPublisher`]|
//!
//! [`DefaultPublisherFactory`]: super::DefaultPublisherFactory
//! [`ShardedPublisherFactory`]: super::ShardedPublisherFactory
//! [`DefaultPublisher`]: super::DefaultPublisher
//! [`ShardedPublisher`]: super::ShardedPublisher

use std::sync::Arc;

use crate::error::BusError;
use crate::events::{Event, EventType};
use crate::subscribers::Subscriber;

/// A queue plus one processing task that dispatches events to subscribers.
///
/// ### Rules
/// - `init` starts the task once; later calls are no-ops.
/// - `publish` never blocks; a full queue delivers on the caller's stack.
/// - `shutdown` is cooperative and drops queued events.
pub trait EventPublisher: Send + Sync + 'static {
    /// Allocates the queue (`buffer_size`, min 1) and spawns the processing task.
    ///
    /// # Panics
    /// Panics when called outside of a tokio runtime.
    fn init(&self, event_type: EventType, buffer_size: usize);

    /// Queues `event` or, if the queue is full, dispatches it synchronously.
    ///
    /// Returns [`BusError::NotStarted`] before `init`; `Ok(true)` otherwise.
    fn publish(&self, event: Arc<dyn Event>) -> Result<bool, BusError>;

    /// Registers `subscriber` for `event_type`.
    ///
    /// Single-type publishers serve one type and ignore the argument.
    fn add_subscriber(&self, subscriber: Arc<dyn Subscriber>, event_type: EventType);

    /// Removes `subscriber` from `event_type`. Unknown subscribers are ignored.
    fn remove_subscriber(&self, subscriber: &Arc<dyn Subscriber>, event_type: EventType);

    /// Stops the processing task and drops queued events. Idempotent.
    fn shutdown(&self);

    /// Whether `shutdown` has been requested.
    fn is_shutdown(&self) -> bool;

    /// Number of events waiting in the queue.
    fn current_event_size(&self) -> usize;

    /// Highest sequence number dispatched so far.
    fn last_dispatched_sequence(&self) -> u64;

    /// Publisher name used in logs and status lines.
    fn name(&self) -> &str;

    /// Human-readable snapshot: name, shutdown flag, current/maximum queue depth.
    fn status(&self) -> String;
}

/// Supplies the publisher that serves an event type.
///
/// Called by the bus the first time a type is published to or subscribed to.
/// The returned publisher must already be initialized.
pub trait PublisherFactory: Send + Sync + 'static {
    /// Returns an initialized publisher for `event_type`.
    fn apply(&self, event_type: EventType, buffer_size: usize) -> Arc<dyn EventPublisher>;
}
