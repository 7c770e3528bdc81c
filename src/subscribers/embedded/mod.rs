//! # Built-in subscribers
//!
//! Small, self-contained implementations useful for demos and debugging.
//!
//! - [`LogWriter`]: traces every event of the types it watches.

mod log;

pub use log::LogWriter;
