//! # Bus configuration.
//!
//! Provides [`BusConfig`], the settings shared by the [`Bus`](crate::Bus) and the
//! publishers it creates.
//!
//! Config is used in two ways:
//! 1. **Bus creation**: `Bus::new(config)` (queue size of lazily created publishers)
//! 2. **Publisher creation**: factories copy the grace-wait settings into every publisher
//!
//! ## Sentinel values
//! - `buffer_size = 0` → clamped to 1
//! - `grace_ticks = 0` → no grace wait, the dispatch loop starts consuming immediately

use std::time::Duration;

/// Global configuration for the notification bus.
///
/// ## Field semantics
/// - `buffer_size`: queue capacity of each lazily created publisher (min 1)
/// - `grace_ticks`: how many ticks a new publisher waits for its first subscriber
/// - `grace_tick`: length of one grace tick
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over sprinkling sentinel
/// checks across the codebase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    /// Bounded queue capacity for publishers created by the bus.
    ///
    /// When a queue is full the producer delivers the event synchronously
    /// instead of dropping it.
    pub buffer_size: usize,

    /// Number of ticks the processing loop waits for the first subscriber.
    ///
    /// Events published during the wait stay queued, so early events are not
    /// lost to a race between producer start and consumer registration.
    pub grace_ticks: u32,

    /// Duration of a single grace tick.
    pub grace_tick: Duration,
}

impl BusConfig {
    /// Returns the buffer size clamped to a minimum of 1.
    #[inline]
    pub fn buffer_size_clamped(&self) -> usize {
        self.buffer_size.max(1)
    }

    /// Returns the upper bound of the subscriber grace wait.
    #[inline]
    pub fn grace_period(&self) -> Duration {
        self.grace_tick.saturating_mul(self.grace_ticks)
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `buffer_size = 16384`
    /// - `grace_ticks = 60`, `grace_tick = 1s` (one minute of grace at most)
    fn default() -> Self {
        Self {
            buffer_size: 16384,
            grace_ticks: 60,
            grace_tick: Duration::from_secs(1),
        }
    }
}
