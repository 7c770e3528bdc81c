//! # Queue and dispatch loop shared by both publisher kinds.
//!
//! [`PublisherCore`] owns the bounded queue, the single processing task, the
//! shutdown token and the dispatch watermark. What differs between
//! [`DefaultPublisher`](super::DefaultPublisher) and
//! [`ShardedPublisher`](super::ShardedPublisher) is only the [`Roster`] that
//! answers "who receives this event".
//!
//! ## Architecture
//! ```text
//! publish(ev) ──try_send──► [bounded queue] ──► run() ──► receive(ev) ──► notify_subscriber()
//!      │                                         │
//!      └── Full ──► receive(ev) on caller ───────┘ (same filter + watermark)
//! ```
//!
//! ## Processing task
//! 1. **Grace wait**: up to `grace_ticks` ticks for the first subscriber; ends
//!    early on shutdown, on a registration, or when a subscriber is present.
//! 2. **Dispatch loop**: `select!` biased towards shutdown, then the next event.
//!    After the token fires, queued events are drained without delivery.
//!
//! ## Rules
//! - At most one processing task per core (`started` flips once).
//! - `publish` never awaits; a full queue degrades to synchronous delivery.
//! - The watermark only moves forward (`fetch_max`).
//! - A subscriber removed after the snapshot is skipped before its callback.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::roster::{Registration, Roster};
use crate::core::BusConfig;
use crate::error::BusError;
use crate::events::Event;
use crate::subscribers::Subscriber;

const UNSTARTED: &str = "<unstarted>";

/// Highest sequence number dispatched so far.
///
/// Updated from both the processing task and the synchronous fallback path;
/// `fetch_max` keeps it non-decreasing under any interleaving.
#[derive(Debug, Default)]
pub(crate) struct Watermark(AtomicU64);

impl Watermark {
    #[inline]
    pub(crate) fn get(&self) -> u64 {
        self.0.load(AtomicOrdering::Acquire)
    }

    /// Moves the watermark to `max(current, seq)`; returns the previous value.
    #[inline]
    pub(crate) fn advance(&self, seq: u64) -> u64 {
        self.0.fetch_max(seq, AtomicOrdering::AcqRel)
    }
}

struct Queue {
    tx: mpsc::Sender<Arc<dyn Event>>,
    capacity: usize,
}

pub(crate) struct PublisherCore<R: Roster> {
    name: OnceLock<String>,
    roster: R,
    queue: OnceLock<Queue>,
    started: AtomicBool,
    token: CancellationToken,
    watermark: Watermark,
    subscribed: Notify,
    grace_ticks: u32,
    grace_tick: Duration,
}

impl<R: Roster> PublisherCore<R> {
    pub(crate) fn new(roster: R, cfg: &BusConfig) -> Arc<Self> {
        Arc::new(Self {
            name: OnceLock::new(),
            roster,
            queue: OnceLock::new(),
            started: AtomicBool::new(false),
            token: CancellationToken::new(),
            watermark: Watermark::default(),
            subscribed: Notify::new(),
            grace_ticks: cfg.grace_ticks,
            grace_tick: cfg.grace_tick,
        })
    }

    /// Fixes the publisher name; later calls are ignored.
    pub(crate) fn set_name(&self, name: impl Into<String>) {
        let _ = self.name.set(name.into());
    }

    pub(crate) fn name(&self) -> &str {
        self.name.get().map(String::as_str).unwrap_or(UNSTARTED)
    }

    pub(crate) fn roster(&self) -> &R {
        &self.roster
    }

    /// Allocates the queue and spawns the processing task.
    ///
    /// Returns `false` (and does nothing) if the core was already started.
    ///
    /// # Panics
    /// Panics when called outside of a tokio runtime.
    pub(crate) fn start(self: &Arc<Self>, buffer_size: usize) -> bool {
        if self
            .started
            .compare_exchange(false, true, AtomicOrdering::AcqRel, AtomicOrdering::Acquire)
            .is_err()
        {
            return false;
        }

        let capacity = buffer_size.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let _ = self.queue.set(Queue { tx, capacity });

        let me = Arc::clone(self);
        tokio::spawn(async move { me.run(rx).await });

        info!(publisher = self.name(), capacity, "publisher started");
        true
    }

    pub(crate) fn is_started(&self) -> bool {
        self.queue.get().is_some()
    }

    /// Enqueues `event`, or delivers it on the caller's stack when the queue is full.
    pub(crate) fn publish(&self, event: Arc<dyn Event>) -> Result<bool, BusError> {
        let Some(queue) = self.queue.get() else {
            return Err(BusError::NotStarted {
                publisher: self.name().to_string(),
            });
        };

        if self.token.is_cancelled() {
            debug!(
                publisher = self.name(),
                sequence = event.sequence(),
                "publisher shut down; dropping event"
            );
            return Ok(true);
        }

        match queue.tx.try_send(event) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    publisher = self.name(),
                    sequence = event.sequence(),
                    "queue full; dispatching synchronously"
                );
                self.receive(&event);
                Ok(true)
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(
                    publisher = self.name(),
                    sequence = event.sequence(),
                    "queue closed; dropping event"
                );
                Ok(true)
            }
        }
    }

    /// Wakes a processing task that is still in its grace wait.
    pub(crate) fn notify_subscribed(&self) {
        self.subscribed.notify_one();
    }

    /// Requests the processing task to stop; queued events are dropped.
    pub(crate) fn shutdown(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        debug!(publisher = self.name(), "publisher shutdown requested");
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue
            .get()
            .map(|q| q.capacity.saturating_sub(q.tx.capacity()))
            .unwrap_or(0)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.queue.get().map(|q| q.capacity).unwrap_or(0)
    }

    pub(crate) fn last_dispatched(&self) -> u64 {
        self.watermark.get()
    }

    pub(crate) fn status(&self) -> String {
        format!(
            "Publisher {:<30}: shutdown={:>5}, queue={:>7}/{:<7}",
            self.name(),
            self.is_shutdown(),
            self.queued(),
            self.capacity()
        )
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Arc<dyn Event>>) {
        self.wait_for_subscribers().await;

        loop {
            let event = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                next = rx.recv() => match next {
                    Some(event) => event,
                    None => break,
                },
            };
            self.receive(&event);
        }

        rx.close();
        let mut dropped = 0usize;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        info!(publisher = self.name(), dropped, "publisher stopped");
    }

    async fn wait_for_subscribers(&self) {
        for _ in 0..self.grace_ticks {
            if self.token.is_cancelled() || self.roster.has_subscribers() {
                return;
            }
            tokio::select! {
                _ = self.token.cancelled() => return,
                _ = self.subscribed.notified() => {}
                _ = tokio::time::sleep(self.grace_tick) => {}
            }
        }
    }

    /// Delivers one event to its current subscribers and advances the watermark.
    fn receive(&self, event: &Arc<dyn Event>) {
        let kind = event.event_type();
        let sequence = event.sequence();

        match self.roster.snapshot(&kind) {
            None => self.roster.report_unheard(self.name(), event),
            Some(targets) => {
                for target in targets {
                    if target.ignore_expired && self.watermark.get() > sequence {
                        debug!(
                            publisher = self.name(),
                            subscriber = target.subscriber.name(),
                            sequence,
                            "event expired for subscriber; skipping"
                        );
                        continue;
                    }
                    if !self.roster.contains(&kind, target.id) {
                        continue;
                    }
                    notify_subscriber(&target, event);
                }
            }
        }

        self.watermark.advance(sequence);
    }
}

/// Runs the callback inline or hands it to the subscriber's executor.
pub(crate) fn notify_subscriber(target: &Registration, event: &Arc<dyn Event>) {
    debug!(
        subscriber = target.subscriber.name(),
        sequence = event.sequence(),
        "event will be received by subscriber"
    );

    match &target.executor {
        Some(handle) => {
            let subscriber = Arc::clone(&target.subscriber);
            let event = Arc::clone(event);
            handle.spawn(async move { invoke(subscriber.as_ref(), &event) });
        }
        None => invoke(target.subscriber.as_ref(), event),
    }
}

fn invoke(subscriber: &dyn Subscriber, event: &Arc<dyn Event>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event)));
    if let Err(panic_err) = outcome {
        let info = {
            let any = &*panic_err;
            if let Some(msg) = any.downcast_ref::<&'static str>() {
                (*msg).to_string()
            } else if let Some(msg) = any.downcast_ref::<String>() {
                msg.clone()
            } else {
                "unknown panic".to_string()
            }
        };
        error!(
            subscriber = subscriber.name(),
            sequence = event.sequence(),
            panic = %info,
            "event callback panicked"
        );
    }
}
