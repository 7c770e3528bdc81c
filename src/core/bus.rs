//! # Bus: event-type registry and routing facade.
//!
//! [`Bus`] maps every [`EventType`] to the publisher that serves it, creates
//! publishers on demand through a [`PublisherFactory`], and owns the shared
//! lifecycle of all of them.
//!
//! ## Architecture
//! ```text
//! register_subscriber(sub) ──► for kind in sub.subscription().kinds()
//!                                  ├─► publishers[kind] or factory.apply(kind)   (lazy)
//!                                  └─► publisher.add_subscriber(sub, kind)
//!
//! publish(ev) ──► publishers[type_of(ev)] ──► publisher.publish(ev)
//!                      └─► missing → warn "unroutable", dropped, Ok(true)
//!
//! shutdown() ──► every distinct publisher.shutdown()   (once)
//! ```
//!
//! ## Rules
//! - **Explicit value**: no global singleton; clone the `Bus` into every
//!   component that publishes or subscribes (clones share state).
//! - **Fire-and-forget**: `publish` only fails with [`BusError::NotStarted`].
//! - **Aliasing**: sharded factories return one instance for many types; the
//!   map then holds several keys pointing at the same publisher.
//! - **No lock across dispatch**: publishers are cloned out of the map before
//!   `publish`, so a callback may publish or register re-entrantly.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::core::BusConfig;
use crate::error::BusError;
use crate::events::{Event, EventType};
use crate::publishers::{DefaultPublisherFactory, EventPublisher, PublisherFactory};
use crate::subscribers::Subscriber;

struct Inner {
    cfg: BusConfig,
    publishers: DashMap<EventType, Arc<dyn EventPublisher>>,
    default_factory: Arc<dyn PublisherFactory>,
    closed: AtomicBool,
}

/// Routing facade over all publishers of the process.
///
/// ### Properties
/// - **Cloneable**: cheap to clone (internally holds an `Arc`).
/// - **Lazy**: publishers are created on first registration or explicit request.
/// - **Non-blocking**: `publish` never awaits.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<Inner>,
}

impl Bus {
    /// Creates a bus whose lazily created publishers are [`DefaultPublisher`](crate::DefaultPublisher)s.
    pub fn new(cfg: BusConfig) -> Self {
        let factory = Arc::new(DefaultPublisherFactory::new(cfg.clone()));
        Self::with_factory(cfg, factory)
    }

    /// Creates a bus with a custom default factory.
    pub fn with_factory(cfg: BusConfig, default_factory: Arc<dyn PublisherFactory>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                publishers: DashMap::new(),
                default_factory,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Configuration the bus was built with.
    pub fn config(&self) -> &BusConfig {
        &self.inner.cfg
    }

    /// Registers `subscriber` for every type it declares, using the default factory.
    pub fn register_subscriber(&self, subscriber: Arc<dyn Subscriber>) -> Result<(), BusError> {
        let factory = Arc::clone(&self.inner.default_factory);
        self.register_subscriber_with(subscriber, factory.as_ref())
    }

    /// Registers `subscriber`; missing publishers are created by `factory`.
    ///
    /// Types that already have a publisher keep it, whatever factory made it.
    pub fn register_subscriber_with(
        &self,
        subscriber: Arc<dyn Subscriber>,
        factory: &dyn PublisherFactory,
    ) -> Result<(), BusError> {
        self.ensure_open()?;

        let subscription = subscriber.subscription();
        if subscription.kinds().is_empty() {
            return Err(BusError::EmptySubscription {
                subscriber: subscriber.name(),
            });
        }

        let buffer_size = self.inner.cfg.buffer_size_clamped();
        for &kind in subscription.kinds() {
            let publisher = self.publisher_or_create(kind, factory, buffer_size);
            publisher.add_subscriber(Arc::clone(&subscriber), kind);
            debug!(
                subscriber = subscriber.name(),
                event_type = %kind,
                publisher = publisher.name(),
                "subscriber registered"
            );
        }
        Ok(())
    }

    /// Removes `subscriber` from every publisher serving one of its types.
    pub fn deregister_subscriber(&self, subscriber: &Arc<dyn Subscriber>) {
        for &kind in subscriber.subscription().kinds() {
            if let Some(publisher) = self.publisher(kind) {
                publisher.remove_subscriber(subscriber, kind);
                debug!(
                    subscriber = subscriber.name(),
                    event_type = %kind,
                    "subscriber deregistered"
                );
            }
        }
    }

    /// Makes sure `event_type` has a publisher, creating it with `factory` and
    /// `buffer_size` when missing. Returns the publisher serving the type.
    pub fn register_to_publisher(
        &self,
        event_type: EventType,
        factory: &dyn PublisherFactory,
        buffer_size: usize,
    ) -> Result<Arc<dyn EventPublisher>, BusError> {
        self.ensure_open()?;
        Ok(self.publisher_or_create(event_type, factory, buffer_size.max(1)))
    }

    /// Removes the publisher of `event_type` from the bus.
    ///
    /// The publisher is shut down unless another type still routes to the same
    /// instance (sharded publishers).
    pub fn deregister_publisher(&self, event_type: EventType) -> Option<Arc<dyn EventPublisher>> {
        let (_, publisher) = self.inner.publishers.remove(&event_type)?;
        let shared = self
            .inner
            .publishers
            .iter()
            .any(|e| Arc::ptr_eq(e.value(), &publisher));
        if !shared {
            publisher.shutdown();
        }
        info!(event_type = %event_type, shared, "publisher deregistered");
        Some(publisher)
    }

    /// Publisher currently serving `event_type`.
    pub fn publisher(&self, event_type: EventType) -> Option<Arc<dyn EventPublisher>> {
        self.inner
            .publishers
            .get(&event_type)
            .map(|p| Arc::clone(p.value()))
    }

    /// Routes `event` to the publisher of its runtime type.
    ///
    /// Unroutable events and events published after shutdown are logged and
    /// dropped; the call still reports `Ok(true)`.
    pub fn publish(&self, event: Arc<dyn Event>) -> Result<bool, BusError> {
        let kind = event.event_type();

        if self.is_shutdown() {
            debug!(
                event_type = %kind,
                sequence = event.sequence(),
                "bus shut down; dropping event"
            );
            return Ok(true);
        }

        match self.publisher(kind) {
            Some(publisher) => publisher.publish(event),
            None => {
                warn!(
                    event_type = %kind,
                    sequence = event.sequence(),
                    "no publisher for event type; please register one"
                );
                Ok(true)
            }
        }
    }

    /// Shorthand for `publish(Arc::new(event))`.
    pub fn publish_event<E: Event>(&self, event: E) -> Result<bool, BusError> {
        self.publish(Arc::new(event))
    }

    /// Status line of every distinct publisher, sorted.
    pub fn statuses(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .distinct_publishers()
            .iter()
            .map(|p| p.status())
            .collect();
        lines.sort_unstable();
        lines
    }

    /// Shuts down every publisher owned by the bus. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, AtomicOrdering::AcqRel) {
            return;
        }
        let publishers = self.distinct_publishers();
        for publisher in &publishers {
            publisher.shutdown();
        }
        info!(publishers = publishers.len(), "bus shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.inner.closed.load(AtomicOrdering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.is_shutdown() {
            return Err(BusError::ShutDown);
        }
        Ok(())
    }

    fn publisher_or_create(
        &self,
        kind: EventType,
        factory: &dyn PublisherFactory,
        buffer_size: usize,
    ) -> Arc<dyn EventPublisher> {
        let entry = self
            .inner
            .publishers
            .entry(kind)
            .or_insert_with(|| factory.apply(kind, buffer_size));
        Arc::clone(entry.value())
    }

    fn distinct_publishers(&self) -> Vec<Arc<dyn EventPublisher>> {
        let mut seen = HashSet::new();
        self.inner
            .publishers
            .iter()
            .filter(|e| seen.insert(Arc::as_ptr(e.value()) as *const () as usize))
            .map(|e| Arc::clone(e.value()))
            .collect()
    }
}
