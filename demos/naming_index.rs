//! # Example: Naming Index
//!
//! A service-registry index kept up to date through the bus.
//!
//! ```text
//! client events (sharded, one queue) ──► ClientServiceIndex
//!                                              └─► publish ServiceChanged
//! ServiceChanged (own publisher)     ──► PushNotifier
//! ```
//!
//! Run with `RUST_LOG=info cargo run --example naming_index`.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify_bus::{
    Bus, BusConfig, Event, EventType, ShardedPublisherFactory, Stamp, Subscriber, Subscription,
};
use tracing::info;

mod client {
    use notify_bus::{Event, Stamp};

    #[derive(Debug)]
    pub struct ClientRegisteredService {
        pub stamp: Stamp,
        pub client: String,
        pub service: String,
    }

    #[derive(Debug)]
    pub struct ClientDeregisteredService {
        pub stamp: Stamp,
        pub client: String,
        pub service: String,
    }

    #[derive(Debug)]
    pub struct ClientDisconnected {
        pub stamp: Stamp,
        pub client: String,
    }

    impl Event for ClientRegisteredService {
        fn sequence(&self) -> u64 {
            self.stamp.seq()
        }
    }

    impl Event for ClientDeregisteredService {
        fn sequence(&self) -> u64 {
            self.stamp.seq()
        }
    }

    impl Event for ClientDisconnected {
        fn sequence(&self) -> u64 {
            self.stamp.seq()
        }
    }
}

mod service {
    use notify_bus::{Event, Stamp};

    #[derive(Debug)]
    pub struct ServiceChanged {
        pub stamp: Stamp,
        pub service: String,
    }

    impl Event for ServiceChanged {
        fn sequence(&self) -> u64 {
            self.stamp.seq()
        }
    }
}

use client::{ClientDeregisteredService, ClientDisconnected, ClientRegisteredService};
use service::ServiceChanged;

/// Which clients publish which service.
struct ClientServiceIndex {
    bus: Bus,
    publishers: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl ClientServiceIndex {
    fn new(bus: Bus) -> Self {
        Self {
            bus,
            publishers: Mutex::new(HashMap::new()),
        }
    }

    fn changed(&self, service: &str) {
        let ev = ServiceChanged {
            stamp: Stamp::next(),
            service: service.to_string(),
        };
        if let Err(e) = self.bus.publish_event(ev) {
            tracing::warn!(error = %e, service, "failed to publish service change");
        }
    }

    fn snapshot(&self) -> Vec<(String, Vec<String>)> {
        let index = self.publishers.lock().unwrap_or_else(|p| p.into_inner());
        let mut out: Vec<_> = index
            .iter()
            .map(|(s, c)| (s.clone(), c.iter().cloned().collect()))
            .collect();
        out.sort();
        out
    }
}

impl Subscriber for ClientServiceIndex {
    fn subscription(&self) -> Subscription {
        Subscription::many([
            EventType::of::<ClientRegisteredService>(),
            EventType::of::<ClientDeregisteredService>(),
            EventType::of::<ClientDisconnected>(),
        ])
    }

    fn on_event(&self, event: &Arc<dyn Event>) {
        let mut touched = Vec::new();
        {
            let mut index = self.publishers.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(ev) = event.downcast_ref::<ClientRegisteredService>() {
                index
                    .entry(ev.service.clone())
                    .or_default()
                    .insert(ev.client.clone());
                touched.push(ev.service.clone());
            } else if let Some(ev) = event.downcast_ref::<ClientDeregisteredService>() {
                if let Some(clients) = index.get_mut(&ev.service) {
                    clients.remove(&ev.client);
                    touched.push(ev.service.clone());
                }
            } else if let Some(ev) = event.downcast_ref::<ClientDisconnected>() {
                for (service, clients) in index.iter_mut() {
                    if clients.remove(&ev.client) {
                        touched.push(service.clone());
                    }
                }
            }
            index.retain(|_, clients| !clients.is_empty());
        }
        for service in touched {
            self.changed(&service);
        }
    }

    fn name(&self) -> &'static str {
        "client-service-index"
    }
}

/// Pushes the latest state of a service to its watchers; stale changes are skipped.
struct PushNotifier;

impl Subscriber for PushNotifier {
    fn subscription(&self) -> Subscription {
        Subscription::to::<ServiceChanged>().ignore_expired()
    }

    fn on_event(&self, event: &Arc<dyn Event>) {
        if let Some(ev) = event.downcast_ref::<ServiceChanged>() {
            info!(service = %ev.service, sequence = ev.sequence(), "[push] service changed");
        }
    }

    fn name(&self) -> &'static str {
        "push-notifier"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,notify_bus=info".into()),
        )
        .with_target(true)
        .init();

    let cfg = BusConfig::default();
    let bus = Bus::new(cfg.clone());
    let sharded = ShardedPublisherFactory::new(cfg);

    let index = Arc::new(ClientServiceIndex::new(bus.clone()));
    bus.register_subscriber_with(index.clone(), &sharded)?;
    bus.register_subscriber(Arc::new(PushNotifier))?;

    let registrations = [
        ("10.0.0.1:8848", "orders"),
        ("10.0.0.2:8848", "orders"),
        ("10.0.0.2:8848", "billing"),
    ];
    for (client, service) in registrations {
        bus.publish_event(ClientRegisteredService {
            stamp: Stamp::next(),
            client: client.into(),
            service: service.into(),
        })?;
    }
    bus.publish_event(ClientDeregisteredService {
        stamp: Stamp::next(),
        client: "10.0.0.1:8848".into(),
        service: "orders".into(),
    })?;
    bus.publish_event(ClientDisconnected {
        stamp: Stamp::next(),
        client: "10.0.0.2:8848".into(),
    })?;

    tokio::time::sleep(Duration::from_millis(200)).await;

    info!(shards = ?sharded.shard_keys(), "sharded publishers");
    for (service, clients) in index.snapshot() {
        info!(service, ?clients, "index");
    }
    for line in bus.statuses() {
        info!("{line}");
    }

    bus.shutdown();
    Ok(())
}
