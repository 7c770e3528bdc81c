//! Subscriber containers used by the publishers.
//!
//! - [`SubscriberSet`]: flat concurrent set (one event type per publisher).
//! - [`SubscriberTable`]: concurrent `EventType → set` table (sharded publisher).
//!
//! Both are read by the dispatch loop and mutated by registration at the same
//! time, so they sit on `dashmap` and hand out owned snapshots instead of
//! holding shard locks across callbacks.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::events::{Event, EventType};
use crate::subscribers::Subscriber;

/// Per-instance identity of a registered subscriber (address of its `Arc`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SubscriberId(usize);

impl SubscriberId {
    pub(crate) fn of(subscriber: &Arc<dyn Subscriber>) -> Self {
        Self(Arc::as_ptr(subscriber) as *const () as usize)
    }
}

/// A subscriber plus the delivery options captured at registration.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) id: SubscriberId,
    pub(crate) subscriber: Arc<dyn Subscriber>,
    pub(crate) ignore_expired: bool,
    pub(crate) executor: Option<Handle>,
}

impl Registration {
    pub(crate) fn new(subscriber: Arc<dyn Subscriber>) -> Self {
        let subscription = subscriber.subscription();
        Self {
            id: SubscriberId::of(&subscriber),
            ignore_expired: subscription.ignores_expired(),
            executor: subscription.executor().cloned(),
            subscriber,
        }
    }
}

/// Read side of a subscriber container, as seen by the dispatch loop.
pub(crate) trait Roster: Send + Sync + 'static {
    /// Returns `true` once anybody is registered (ends the grace wait).
    fn has_subscribers(&self) -> bool;

    /// Owned snapshot of the subscribers for `kind`; `None` when nobody listens.
    fn snapshot(&self, kind: &EventType) -> Option<Vec<Registration>>;

    /// Whether `id` is still registered for `kind`.
    fn contains(&self, kind: &EventType, id: SubscriberId) -> bool;

    /// Reports an event that reached the loop with nobody to deliver it to.
    fn report_unheard(&self, publisher: &str, event: &Arc<dyn Event>) {
        warn!(
            publisher,
            sequence = event.sequence(),
            event = ?event,
            "event lost: no subscriber"
        );
    }
}

/// Flat set of subscribers for a single-type publisher.
#[derive(Default)]
pub(crate) struct SubscriberSet {
    inner: DashMap<SubscriberId, Registration>,
}

impl SubscriberSet {
    /// Adds a registration; returns `false` if that instance was already present.
    pub(crate) fn insert(&self, registration: Registration) -> bool {
        self.inner
            .insert(registration.id, registration)
            .is_none()
    }

    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        self.inner.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}

impl Roster for SubscriberSet {
    fn has_subscribers(&self) -> bool {
        !self.inner.is_empty()
    }

    fn snapshot(&self, _kind: &EventType) -> Option<Vec<Registration>> {
        let all: Vec<Registration> = self.inner.iter().map(|e| e.value().clone()).collect();
        if all.is_empty() { None } else { Some(all) }
    }

    fn contains(&self, _kind: &EventType, id: SubscriberId) -> bool {
        self.inner.contains_key(&id)
    }
}

/// Per-type subscriber sets for the sharded publisher.
///
/// Empty sets are removed, so a present key always has at least one subscriber.
#[derive(Default)]
pub(crate) struct SubscriberTable {
    inner: DashMap<EventType, HashMap<SubscriberId, Registration>>,
}

impl SubscriberTable {
    pub(crate) fn insert(&self, kind: EventType, registration: Registration) -> bool {
        self.inner
            .entry(kind)
            .or_default()
            .insert(registration.id, registration)
            .is_none()
    }

    pub(crate) fn remove(&self, kind: &EventType, id: SubscriberId) -> bool {
        let removed = self
            .inner
            .get_mut(kind)
            .is_some_and(|mut set| set.remove(&id).is_some());
        self.inner.remove_if(kind, |_, set| set.is_empty());
        removed
    }

    /// Types that currently have at least one subscriber.
    pub(crate) fn kinds(&self) -> Vec<EventType> {
        self.inner.iter().map(|e| *e.key()).collect()
    }
}

impl Roster for SubscriberTable {
    fn has_subscribers(&self) -> bool {
        !self.inner.is_empty()
    }

    fn snapshot(&self, kind: &EventType) -> Option<Vec<Registration>> {
        self.inner
            .get(kind)
            .filter(|set| !set.is_empty())
            .map(|set| set.values().cloned().collect())
    }

    fn contains(&self, kind: &EventType, id: SubscriberId) -> bool {
        self.inner
            .get(kind)
            .is_some_and(|set| set.contains_key(&id))
    }

    fn report_unheard(&self, publisher: &str, event: &Arc<dyn Event>) {
        debug!(
            publisher,
            event_type = %event.event_type(),
            sequence = event.sequence(),
            "no subscribers for event type; dropping"
        );
    }
}
