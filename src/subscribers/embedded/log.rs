//! # LogWriter: event tracer
//!
//! A multi-type subscriber that writes every event it receives to `tracing`
//! at `INFO`. Use it for tests, demos, or to eyeball traffic on a type.
//!
//! ## Example output
//! ```text
//! INFO notify_bus: event event_type="ServiceChanged" sequence=42 subscriber="LogWriter"
//! INFO notify_bus: event event_type="ClientDisconnected" sequence=43 subscriber="LogWriter"
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::events::{Event, EventType};
use crate::subscribers::{Subscriber, Subscription};

/// Event writer subscriber.
pub struct LogWriter {
    kinds: Vec<EventType>,
    seen: AtomicU64,
}

impl LogWriter {
    /// Writer for the given event types.
    #[must_use]
    pub fn new(kinds: impl IntoIterator<Item = EventType>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            seen: AtomicU64::new(0),
        }
    }

    /// Number of events written so far.
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }
}

impl Subscriber for LogWriter {
    fn subscription(&self) -> Subscription {
        Subscription::many(self.kinds.iter().copied())
    }

    fn on_event(&self, event: &Arc<dyn Event>) {
        self.seen.fetch_add(1, Ordering::Relaxed);
        info!(
            event_type = event.event_type().simple_name(),
            sequence = event.sequence(),
            subscriber = self.name(),
            "event"
        );
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
