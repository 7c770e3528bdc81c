//! # notify-bus
//!
//! **notify-bus** is an in-process event notification bus for Rust.
//!
//! Components publish immutable events; subscribers register interest in one
//! or several event types. Each event type is served by a publisher that owns
//! a bounded queue and a single processing task, so producers never wait for
//! consumers.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producer A        producer B        producer C
//!       │                 │                 │
//!       └──── publish(Arc<dyn Event>) ──────┘
//!                         ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Bus (routing facade)                                             │
//! │  - EventType → publisher map (lazy, via PublisherFactory)         │
//! │  - unroutable events are logged and dropped                       │
//! │  - owns shutdown of every publisher                               │
//! └──────┬──────────────────────────┬─────────────────────────────────┘
//!        ▼                          ▼
//! ┌────────────────────┐   ┌──────────────────────────────────┐
//! │  DefaultPublisher  │   │  ShardedPublisher                │
//! │  one type          │   │  many types, one queue           │
//! │  [bounded queue]   │   │  [bounded queue]                 │
//! │  run() task        │   │  run() task, dispatch by type    │
//! └─────────┬──────────┘   └──────────────┬───────────────────┘
//!           ▼                             ▼
//!   sub1.on_event()  sub2.on_event()   index.on_event()  ...
//!   (inline, or spawned on the subscriber's executor)
//! ```
//!
//! ### Publish path
//! ```text
//! publish(ev)
//!   ├─► queue has room → enqueue                         → Ok(true)
//!   ├─► queue full     → dispatch on the caller's stack  → Ok(true)
//!   └─► not started    → Err(BusError::NotStarted)
//!
//! run() loop
//!   ├─► wait up to grace_ticks × grace_tick for a first subscriber
//!   ├─► dequeue in FIFO order
//!   ├─► skip subscribers that ignore expired events when seq < watermark
//!   ├─► call each subscriber; a panic is logged and contained
//!   └─► watermark = max(watermark, seq)
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                             |
//! |-------------------|-----------------------------------------------------------|------------------------------------------------|
//! | **Events**        | Immutable payloads with a global sequence.                | [`Event`], [`EventType`], [`Stamp`]            |
//! | **Subscribers**   | Single- or multi-type callbacks, optional executor.       | [`Subscriber`], [`Subscription`]               |
//! | **Publishers**    | Per-type and sharded queues with backpressure fallback.   | [`DefaultPublisher`], [`ShardedPublisher`]     |
//! | **Routing**       | Lazy publisher creation, routing, lifecycle.              | [`Bus`], [`PublisherFactory`]                  |
//! | **Errors**        | Typed errors for misuse of the bus.                       | [`BusError`]                                   |
//! | **Configuration** | Queue size and grace wait.                                | [`BusConfig`]                                  |
//!
//! ## Optional features
//! - `logging` (default): exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use notify_bus::{Bus, BusConfig, Event, Stamp, Subscriber, Subscription};
//!
//! #[derive(Debug)]
//! struct InstanceRegistered {
//!     stamp: Stamp,
//!     service: String,
//! }
//!
//! impl Event for InstanceRegistered {
//!     fn sequence(&self) -> u64 { self.stamp.seq() }
//! }
//!
//! #[derive(Default)]
//! struct Counter(AtomicUsize);
//!
//! impl Subscriber for Counter {
//!     fn subscription(&self) -> Subscription { Subscription::to::<InstanceRegistered>() }
//!     fn on_event(&self, event: &Arc<dyn Event>) {
//!         if let Some(ev) = event.downcast_ref::<InstanceRegistered>() {
//!             assert_eq!(ev.service, "orders");
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), notify_bus::BusError> {
//!     let bus = Bus::new(BusConfig::default());
//!     let counter = Arc::new(Counter::default());
//!     bus.register_subscriber(counter.clone())?;
//!
//!     bus.publish_event(InstanceRegistered { stamp: Stamp::next(), service: "orders".into() })?;
//!
//!     while counter.0.load(Ordering::Relaxed) == 0 {
//!         tokio::task::yield_now().await;
//!     }
//!     bus.shutdown();
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod publishers;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{Bus, BusConfig};
pub use error::BusError;
pub use events::{next_sequence, Event, EventType, Stamp};
pub use publishers::{
    DefaultPublisher, DefaultPublisherFactory, EventPublisher, PublisherFactory, ShardedPublisher,
    ShardedPublisherFactory,
};
pub use subscribers::{Subscriber, Subscription};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
