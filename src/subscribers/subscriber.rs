//! # Event subscriber contract.
//!
//! Provides [`Subscriber`], the extension point for consumers of the bus, and
//! [`Subscription`], the value describing what a subscriber wants.
//!
//! A subscription is a tagged variant rather than a class hierarchy:
//! - **single-type**: `|kinds| = 1`, may opt into skipping expired events;
//! - **multi-type**: any number of kinds, registered once per kind, always
//!   receives every event (staleness is not tracked across categories).
//!
//! ## Architecture
//! ```text
//! publisher loop ──► Subscription::executor() == None ──► subscriber.on_event() (inline)
//!                └─► Subscription::executor() == Some(h) ──► h.spawn(on_event)  (async)
//!                                                          └─► panic caught and logged
//! ```
//!
//! ## Rules
//! - Inline callbacks run on the publisher's own task, in queue order.
//! - A slow inline callback stalls only its own publisher.
//! - Callbacks handed to an executor may reorder relative to each other.
//! - Panics are caught and logged; dispatch continues.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use notify_bus::{Event, Stamp, Subscriber, Subscription};
//!
//! #[derive(Debug)]
//! struct ServiceChanged { stamp: Stamp, service: String }
//!
//! impl Event for ServiceChanged {
//!     fn sequence(&self) -> u64 { self.stamp.seq() }
//! }
//!
//! struct PushNotifier;
//!
//! impl Subscriber for PushNotifier {
//!     fn subscription(&self) -> Subscription {
//!         Subscription::to::<ServiceChanged>().ignore_expired()
//!     }
//!
//!     fn on_event(&self, event: &Arc<dyn Event>) {
//!         if let Some(ev) = event.downcast_ref::<ServiceChanged>() {
//!             // push the new instance list for `ev.service`
//!             let _ = &ev.service;
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "push-notifier" }
//! }
//! ```

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::events::{Event, EventType};

/// Consumer of one or more event types.
///
/// Identity is per instance: the bus tracks registrations by the address of the
/// `Arc<dyn Subscriber>`, so two equal-looking subscribers are distinct.
///
/// ### Implementation requirements
/// - `subscription()` must return the same kinds for the lifetime of a registration.
/// - Keep inline callbacks short; they run on the publisher's task.
pub trait Subscriber: Send + Sync + 'static {
    /// Describes the event types of interest and how to deliver them.
    fn subscription(&self) -> Subscription;

    /// Handles a single event.
    ///
    /// Panics are caught and logged by the publisher.
    fn on_event(&self, event: &Arc<dyn Event>);

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose; override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// What a subscriber listens to and how it wants events delivered.
#[derive(Clone, Debug)]
pub struct Subscription {
    kinds: Vec<EventType>,
    multi: bool,
    ignore_expired: bool,
    executor: Option<Handle>,
}

impl Subscription {
    /// Single-type subscription for `E`.
    pub fn to<E: Event>() -> Self {
        Self::single(EventType::of::<E>())
    }

    /// Single-type subscription for a runtime type tag.
    pub fn single(kind: EventType) -> Self {
        Self {
            kinds: vec![kind],
            multi: false,
            ignore_expired: false,
            executor: None,
        }
    }

    /// Multi-type subscription. Duplicates are removed, first occurrence wins.
    pub fn many(kinds: impl IntoIterator<Item = EventType>) -> Self {
        let mut unique: Vec<EventType> = Vec::new();
        for kind in kinds {
            if !unique.contains(&kind) {
                unique.push(kind);
            }
        }
        Self {
            kinds: unique,
            multi: true,
            ignore_expired: false,
            executor: None,
        }
    }

    /// Skip events older than the last one the publisher already dispatched.
    ///
    /// Has no effect on multi-type subscriptions.
    #[must_use]
    pub fn ignore_expired(mut self) -> Self {
        self.ignore_expired = true;
        self
    }

    /// Run callbacks on `executor` instead of inline on the publisher's task.
    #[must_use]
    pub fn on(mut self, executor: Handle) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Declared event types, in declaration order.
    #[inline]
    pub fn kinds(&self) -> &[EventType] {
        &self.kinds
    }

    /// Returns `true` for subscriptions built with [`Subscription::many`].
    #[inline]
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// Whether expired events are filtered for this subscription.
    #[inline]
    pub fn ignores_expired(&self) -> bool {
        self.ignore_expired && !self.multi
    }

    /// Executor that receives callbacks, if any.
    #[inline]
    pub fn executor(&self) -> Option<&Handle> {
        self.executor.as_ref()
    }
}
