//! Bus core: routing facade and configuration.
//!
//! The public API from this module is [`Bus`], which maps event types to
//! publishers and owns their lifecycle, and [`BusConfig`].
//!
//! Internal modules:
//! - [`bus`]: registry of publishers, lazy creation, routing, shutdown;
//! - [`config`]: queue size and grace-wait settings.

mod bus;
mod config;

pub use bus::Bus;
pub use config::BusConfig;
