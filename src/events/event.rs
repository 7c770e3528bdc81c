//! # Events carried by the bus.
//!
//! An [`Event`] is an immutable value shared as `Arc<dyn Event>` between the
//! producer, the publisher queue and every subscriber. Its runtime type,
//! captured as an [`EventType`], decides which publisher it is routed to.
//!
//! ## Ordering guarantees
//! Every event carries a globally unique sequence number that increases
//! monotonically across the process. Take it from [`next_sequence`] (or a
//! [`Stamp`]) exactly once, when the event is constructed.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use notify_bus::{Event, EventType, Stamp};
//!
//! #[derive(Debug)]
//! struct ClientDisconnected {
//!     stamp: Stamp,
//!     client_id: String,
//! }
//!
//! impl Event for ClientDisconnected {
//!     fn sequence(&self) -> u64 {
//!         self.stamp.seq()
//!     }
//! }
//!
//! let ev: Arc<dyn Event> = Arc::new(ClientDisconnected {
//!     stamp: Stamp::next(),
//!     client_id: "10.0.0.7:51234#true".into(),
//! });
//!
//! assert_eq!(ev.event_type(), EventType::of::<ClientDisconnected>());
//! assert_eq!(ev.event_type().simple_name(), "ClientDisconnected");
//! let typed = ev.downcast_ref::<ClientDisconnected>().unwrap();
//! assert_eq!(typed.client_id, "10.0.0.7:51234#true");
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Returns the next process-wide event sequence number.
#[inline]
pub fn next_sequence() -> u64 {
    EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Immutable notification routed by its runtime type.
///
/// ### Implementation requirements
/// - `sequence()` must return the value taken at construction, never a fresh one.
/// - Payload fields must not change after construction (events are shared).
pub trait Event: Any + fmt::Debug + Send + Sync {
    /// Globally unique, monotonically increasing sequence number.
    fn sequence(&self) -> u64;

    /// Full type name of the concrete event, used in logs and publisher names.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl dyn Event {
    /// Runtime type tag of this event.
    #[inline]
    pub fn event_type(&self) -> EventType {
        EventType::of_val(self)
    }

    /// Returns `true` if the concrete event type is `E`.
    #[inline]
    pub fn is<E: Event>(&self) -> bool {
        let any: &dyn Any = self;
        any.is::<E>()
    }

    /// Borrows the concrete event if it is of type `E`.
    #[inline]
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        let any: &dyn Any = self;
        any.downcast_ref::<E>()
    }
}

/// Type tag identifying a kind of event.
///
/// Equality and hashing use the [`TypeId`] only; the name is kept for logs,
/// publisher names and shard keys.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// Tag of the static event type `E`.
    #[inline]
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// Tag of the concrete type behind a trait object.
    pub fn of_val(event: &dyn Event) -> Self {
        let any: &dyn Any = event;
        Self {
            id: any.type_id(),
            name: event.type_name(),
        }
    }

    /// Full type path, e.g. `registry::client::ClientRegistered`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment without generic arguments, e.g. `ClientRegistered`.
    pub fn simple_name(&self) -> &'static str {
        let base = strip_generics(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Module path of the type, e.g. `registry::client`.
    ///
    /// Event types declared side by side share a family, which is the default
    /// shard key of [`ShardedPublisherFactory`](crate::ShardedPublisherFactory).
    pub fn family(&self) -> &'static str {
        let base = strip_generics(self.name);
        base.rsplit_once("::").map(|(module, _)| module).unwrap_or(base)
    }
}

fn strip_generics(name: &'static str) -> &'static str {
    name.split('<').next().unwrap_or(name)
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventType").field(&self.name).finish()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Sequence number plus wall-clock creation time.
///
/// Embed one in an event struct and return [`Stamp::seq`] from
/// [`Event::sequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    seq: u64,
    at: SystemTime,
}

impl Stamp {
    /// Takes the next sequence number and the current time.
    pub fn next() -> Self {
        Self {
            seq: next_sequence(),
            at: SystemTime::now(),
        }
    }

    /// Sequence number assigned at construction.
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Wall-clock timestamp (for logs).
    #[inline]
    pub fn at(&self) -> SystemTime {
        self.at
    }
}

impl Default for Stamp {
    fn default() -> Self {
        Self::next()
    }
}
