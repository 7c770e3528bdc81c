//! # Event subscribers.
//!
//! This module provides the [`Subscriber`] contract and the [`Subscription`]
//! descriptor the bus reads at registration time.
//!
//! ## Architecture
//! ```text
//! Bus::register_subscriber(sub)
//!     └─► sub.subscription()
//!             ├─ kinds            one or many EventTypes
//!             ├─ ignore_expired   skip events older than the publisher watermark
//!             └─ executor         run callbacks on another runtime instead of inline
//!
//! publisher loop ──► Subscriber::on_event(&Arc<dyn Event>)
//! ```
//!
//! ## Subscriber kinds
//! - **Single-type**: built with [`Subscription::to`] or [`Subscription::single`].
//! - **Multi-type**: built with [`Subscription::many`]; one callback per event,
//!   branching on the runtime type. The expiry filter does not apply to them.

#[cfg(feature = "logging")]
mod embedded;
mod subscriber;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscriber::{Subscriber, Subscription};
