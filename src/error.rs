//! Error types used by the notification bus.
//!
//! The bus is fire-and-forget: saturated queues, missing subscribers, unroutable
//! events and panicking callbacks are **not** errors and only show up in logs.
//! [`BusError`] is reserved for usage errors a caller has to fix (wrong
//! initialization order, registering on a bus that was shut down).
//!
//! Like the rest of the crate, [`BusError`] provides `as_label`/`as_message`
//! helpers for logs and metrics.

use thiserror::Error;

/// # Errors produced by publishers and the bus facade.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// `publish` was called on a publisher before `init`.
    #[error("publisher `{publisher}` has not been started")]
    NotStarted {
        /// Name of the publisher (`<unstarted>` when it never got one).
        publisher: String,
    },

    /// Registration was attempted after [`Bus::shutdown`](crate::Bus::shutdown).
    #[error("bus has been shut down")]
    ShutDown,

    /// The subscriber's [`Subscription`](crate::Subscription) lists no event type.
    #[error("subscriber `{subscriber}` declares no event types")]
    EmptySubscription {
        /// Name reported by the subscriber.
        subscriber: &'static str,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use notify_bus::BusError;
    ///
    /// let err = BusError::NotStarted { publisher: "ClientEvent".into() };
    /// assert_eq!(err.as_label(), "bus_not_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::NotStarted { .. } => "bus_not_started",
            BusError::ShutDown => "bus_shut_down",
            BusError::EmptySubscription { .. } => "bus_empty_subscription",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::NotStarted { publisher } => {
                format!("publisher={publisher} used before init")
            }
            BusError::ShutDown => "bus shut down; registration refused".to_string(),
            BusError::EmptySubscription { subscriber } => {
                format!("subscriber={subscriber} has an empty subscription")
            }
        }
    }

    /// Indicates whether the error is an initialization-order mistake.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            BusError::NotStarted { .. } | BusError::EmptySubscription { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(BusError::ShutDown.as_label(), "bus_shut_down");
        assert_eq!(
            BusError::EmptySubscription { subscriber: "idx" }.as_label(),
            "bus_empty_subscription"
        );
    }

    #[test]
    fn display_names_the_publisher() {
        let err = BusError::NotStarted {
            publisher: "ServiceEvent".to_string(),
        };
        assert_eq!(err.to_string(), "publisher `ServiceEvent` has not been started");
        assert_eq!(err.as_message(), "publisher=ServiceEvent used before init");
        assert!(err.is_usage_error());
        assert!(!BusError::ShutDown.is_usage_error());
    }
}
