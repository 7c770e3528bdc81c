//! # Single-type publisher.
//!
//! [`DefaultPublisher`] serves exactly one [`EventType`]: one bounded queue,
//! one processing task, one flat subscriber set.
//!
//! ## Backpressure
//! ```text
//! publish(ev)
//!     ├── queue has room ──► enqueue, return Ok(true)
//!     └── queue full     ──► dispatch on the caller's stack, return Ok(true)
//! ```
//! Producers never block and events are never dropped for lack of room; a
//! saturated queue trades throughput for immediate delivery.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use notify_bus::{BusConfig, DefaultPublisher, Event, EventPublisher, EventType, Stamp};
//!
//! #[derive(Debug)]
//! struct InstanceMetadataChanged(Stamp);
//! impl Event for InstanceMetadataChanged {
//!     fn sequence(&self) -> u64 { self.0.seq() }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let publisher = DefaultPublisher::new(&BusConfig::default());
//!     publisher.init(EventType::of::<InstanceMetadataChanged>(), 1024);
//!     assert_eq!(publisher.name(), "InstanceMetadataChanged");
//!
//!     let ev: Arc<dyn Event> = Arc::new(InstanceMetadataChanged(Stamp::next()));
//!     assert!(publisher.publish(ev).unwrap());
//!     publisher.shutdown();
//! }
//! ```

use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use super::engine::PublisherCore;
use super::publisher::{EventPublisher, PublisherFactory};
use super::roster::{Registration, SubscriberId, SubscriberSet};
use crate::core::BusConfig;
use crate::error::BusError;
use crate::events::{Event, EventType};
use crate::subscribers::Subscriber;

/// Publisher dedicated to a single event type.
///
/// Dropping the publisher requests shutdown of its processing task.
pub struct DefaultPublisher {
    core: Arc<PublisherCore<SubscriberSet>>,
    event_type: OnceLock<EventType>,
}

impl DefaultPublisher {
    /// Creates an unstarted publisher; call [`EventPublisher::init`] before publishing.
    pub fn new(cfg: &BusConfig) -> Self {
        Self {
            core: PublisherCore::new(SubscriberSet::default(), cfg),
            event_type: OnceLock::new(),
        }
    }

    /// The type fixed by `init`, if it ran.
    pub fn event_type(&self) -> Option<EventType> {
        self.event_type.get().copied()
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.core.roster().len()
    }

    /// Whether `init` has run.
    pub fn is_initialized(&self) -> bool {
        self.core.is_started()
    }
}

impl EventPublisher for DefaultPublisher {
    fn init(&self, event_type: EventType, buffer_size: usize) {
        if self.event_type.set(event_type).is_err() {
            debug!(publisher = self.core.name(), "publisher already initialized");
            return;
        }
        self.core.set_name(event_type.simple_name());
        self.core.start(buffer_size);
    }

    fn publish(&self, event: Arc<dyn Event>) -> Result<bool, BusError> {
        self.core.publish(event)
    }

    fn add_subscriber(&self, subscriber: Arc<dyn Subscriber>, event_type: EventType) {
        if let Some(own) = self.event_type.get() {
            if *own != event_type {
                warn!(
                    publisher = self.core.name(),
                    requested = %event_type,
                    "subscriber registered for a foreign type on a single-type publisher"
                );
            }
        }
        if self.core.roster().insert(Registration::new(subscriber)) {
            self.core.notify_subscribed();
        }
    }

    fn remove_subscriber(&self, subscriber: &Arc<dyn Subscriber>, _event_type: EventType) {
        self.core.roster().remove(SubscriberId::of(subscriber));
    }

    fn shutdown(&self) {
        self.core.shutdown();
    }

    fn is_shutdown(&self) -> bool {
        self.core.is_shutdown()
    }

    fn current_event_size(&self) -> usize {
        self.core.queued()
    }

    fn last_dispatched_sequence(&self) -> u64 {
        self.core.last_dispatched()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn status(&self) -> String {
        self.core.status()
    }
}

impl Drop for DefaultPublisher {
    fn drop(&mut self) {
        self.core.shutdown();
    }
}

/// Creates one [`DefaultPublisher`] per event type.
#[derive(Clone, Debug, Default)]
pub struct DefaultPublisherFactory {
    cfg: BusConfig,
}

impl DefaultPublisherFactory {
    /// Factory whose publishers use the grace-wait settings of `cfg`.
    pub fn new(cfg: BusConfig) -> Self {
        Self { cfg }
    }
}

impl PublisherFactory for DefaultPublisherFactory {
    fn apply(&self, event_type: EventType, buffer_size: usize) -> Arc<dyn EventPublisher> {
        let publisher = DefaultPublisher::new(&self.cfg);
        publisher.init(event_type, buffer_size);
        Arc::new(publisher)
    }
}
