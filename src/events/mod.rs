//! Event data model.
//!
//! ## Contents
//! - [`Event`] payload contract: global sequence plus runtime type
//! - [`EventType`] routing key derived from the concrete Rust type
//! - [`Stamp`] sequence and wall-clock time captured at construction
//! - [`next_sequence`] process-wide monotonic counter behind every stamp
//!
//! Events travel through the bus as `Arc<dyn Event>`, so every subscriber of
//! one publish observes the same allocation.

mod event;

pub use event::{next_sequence, Event, EventType, Stamp};
