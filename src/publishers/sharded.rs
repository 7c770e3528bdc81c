//! # Sharded publisher: many event types, one queue.
//!
//! Dozens of fine-grained event types with low or medium throughput do not
//! each need a dedicated task. [`ShardedPublisher`] multiplexes them onto one
//! queue and dispatches by the runtime type of each dequeued event.
//!
//! ## Architecture
//! ```text
//! ClientRegistered ──┐
//! ClientDeregistered ┼──► [queue] ──► run() ──► table[type_of(ev)] ──► subscribers of that type
//! ClientDisconnected ┘                              └─► no entry → debug log, dropped (never broadcast)
//! ```
//!
//! [`ShardedPublisherFactory`] hands the same instance to every type that maps
//! to the same shard key, so the [`Bus`](crate::Bus) aliases all of them to it.

use std::sync::Arc;

use dashmap::DashMap;

use super::engine::PublisherCore;
use super::publisher::{EventPublisher, PublisherFactory};
use super::roster::{Registration, SubscriberId, SubscriberTable};
use crate::core::BusConfig;
use crate::error::BusError;
use crate::events::{Event, EventType};
use crate::subscribers::Subscriber;

/// Publisher that serves several event types through one processing task.
///
/// Dropping the publisher requests shutdown of its processing task.
pub struct ShardedPublisher {
    core: Arc<PublisherCore<SubscriberTable>>,
}

impl ShardedPublisher {
    /// Creates an unstarted publisher named `name` (usually the shard key).
    pub fn new(name: impl Into<String>, cfg: &BusConfig) -> Self {
        let core = PublisherCore::new(SubscriberTable::default(), cfg);
        core.set_name(name);
        Self { core }
    }

    /// Event types that currently have at least one subscriber.
    pub fn subscribed_types(&self) -> Vec<EventType> {
        self.core.roster().kinds()
    }
}

impl EventPublisher for ShardedPublisher {
    fn init(&self, _event_type: EventType, buffer_size: usize) {
        self.core.start(buffer_size);
    }

    fn publish(&self, event: Arc<dyn Event>) -> Result<bool, BusError> {
        self.core.publish(event)
    }

    fn add_subscriber(&self, subscriber: Arc<dyn Subscriber>, event_type: EventType) {
        if self
            .core
            .roster()
            .insert(event_type, Registration::new(subscriber))
        {
            self.core.notify_subscribed();
        }
    }

    fn remove_subscriber(&self, subscriber: &Arc<dyn Subscriber>, event_type: EventType) {
        self.core
            .roster()
            .remove(&event_type, SubscriberId::of(subscriber));
    }

    fn shutdown(&self) {
        self.core.shutdown();
    }

    fn is_shutdown(&self) -> bool {
        self.core.is_shutdown()
    }

    fn current_event_size(&self) -> usize {
        self.core.queued()
    }

    fn last_dispatched_sequence(&self) -> u64 {
        self.core.last_dispatched()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn status(&self) -> String {
        self.core.status()
    }
}

impl Drop for ShardedPublisher {
    fn drop(&mut self) {
        self.core.shutdown();
    }
}

type ShardResolver = dyn Fn(&EventType) -> String + Send + Sync;

/// Maps event types onto shared [`ShardedPublisher`] instances.
///
/// The shard key defaults to [`EventType::family`], so event types declared in
/// the same module share one publisher (e.g. all client events, all service
/// events).
pub struct ShardedPublisherFactory {
    cfg: BusConfig,
    shards: DashMap<String, Arc<ShardedPublisher>>,
    resolver: Box<ShardResolver>,
}

impl ShardedPublisherFactory {
    /// Factory keyed by the module path of each event type.
    pub fn new(cfg: BusConfig) -> Self {
        Self::with_resolver(cfg, |t| t.family().to_string())
    }

    /// Factory with a custom `EventType → shard key` mapping.
    pub fn with_resolver<F>(cfg: BusConfig, resolver: F) -> Self
    where
        F: Fn(&EventType) -> String + Send + Sync + 'static,
    {
        Self {
            cfg,
            shards: DashMap::new(),
            resolver: Box::new(resolver),
        }
    }

    /// The publisher behind `key`, if it was created.
    pub fn shard(&self, key: &str) -> Option<Arc<ShardedPublisher>> {
        self.shards.get(key).map(|s| Arc::clone(s.value()))
    }

    /// Sorted list of shard keys created so far.
    pub fn shard_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.shards.iter().map(|e| e.key().clone()).collect();
        keys.sort_unstable();
        keys
    }
}

impl PublisherFactory for ShardedPublisherFactory {
    fn apply(&self, event_type: EventType, buffer_size: usize) -> Arc<dyn EventPublisher> {
        let key = (self.resolver)(&event_type);
        let shard = self
            .shards
            .entry(key.clone())
            .or_insert_with(|| {
                let publisher = ShardedPublisher::new(key, &self.cfg);
                publisher.init(event_type, buffer_size);
                Arc::new(publisher)
            })
            .value()
            .clone();
        shard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::events::Stamp;
    use crate::subscribers::Subscription;

    #[derive(Debug)]
    struct Registered(Stamp);
    impl Event for Registered {
        fn sequence(&self) -> u64 {
            self.0.seq()
        }
    }

    #[derive(Debug)]
    struct Deregistered(Stamp);
    impl Event for Deregistered {
        fn sequence(&self) -> u64 {
            self.0.seq()
        }
    }

    #[derive(Debug)]
    struct Disconnected(Stamp);
    impl Event for Disconnected {
        fn sequence(&self) -> u64 {
            self.0.seq()
        }
    }

    #[derive(Default)]
    struct Index {
        seen: Mutex<Vec<(&'static str, u64)>>,
    }

    impl Index {
        fn seen(&self) -> Vec<(&'static str, u64)> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Subscriber for Index {
        fn subscription(&self) -> Subscription {
            Subscription::many([EventType::of::<Registered>(), EventType::of::<Deregistered>()])
        }
        fn on_event(&self, event: &Arc<dyn Event>) {
            let kind = event.event_type().simple_name();
            self.seen.lock().unwrap().push((kind, event.sequence()));
        }
    }

    fn quick() -> BusConfig {
        BusConfig {
            buffer_size: 32,
            grace_ticks: 60,
            grace_tick: Duration::from_millis(10),
        }
    }

    async fn wait_for(index: &Index, n: usize) -> Vec<(&'static str, u64)> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let seen = index.seen();
                if seen.len() >= n {
                    return seen;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("events were not delivered in time")
    }

    fn register_all(publisher: &ShardedPublisher, index: &Arc<Index>) -> Arc<dyn Subscriber> {
        let sub: Arc<dyn Subscriber> = index.clone();
        for kind in sub.subscription().kinds() {
            publisher.add_subscriber(Arc::clone(&sub), *kind);
        }
        sub
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispatches_by_runtime_type_only() {
        let publisher = ShardedPublisher::new("client", &quick());
        publisher.init(EventType::of::<Registered>(), 32);
        let index = Arc::new(Index::default());
        register_all(&publisher, &index);

        let reg: Arc<dyn Event> = Arc::new(Registered(Stamp::next()));
        let gone: Arc<dyn Event> = Arc::new(Disconnected(Stamp::next()));
        let dereg: Arc<dyn Event> = Arc::new(Deregistered(Stamp::next()));
        publisher.publish(Arc::clone(&reg)).unwrap();
        publisher.publish(Arc::clone(&gone)).unwrap();
        publisher.publish(Arc::clone(&dereg)).unwrap();

        let seen = wait_for(&index, 2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            index.seen(),
            vec![
                ("Registered", reg.sequence()),
                ("Deregistered", dereg.sequence())
            ]
        );
        assert_eq!(seen.len(), 2);
        assert_eq!(publisher.last_dispatched_sequence(), dereg.sequence());
        publisher.shutdown();
    }

    #[tokio::test]
    async fn removing_last_subscriber_drops_the_type() {
        let publisher = ShardedPublisher::new("client", &quick());
        publisher.init(EventType::of::<Registered>(), 8);
        let index = Arc::new(Index::default());
        let sub = register_all(&publisher, &index);

        let mut kinds = publisher.subscribed_types();
        kinds.sort_by_key(|k| k.name());
        assert_eq!(kinds.len(), 2);

        publisher.remove_subscriber(&sub, EventType::of::<Registered>());
        assert_eq!(publisher.subscribed_types(), vec![EventType::of::<Deregistered>()]);
        publisher.remove_subscriber(&sub, EventType::of::<Deregistered>());
        assert!(publisher.subscribed_types().is_empty());
        assert_eq!(publisher.name(), "client");
        publisher.shutdown();
    }

    #[tokio::test]
    async fn factory_shares_one_publisher_per_family() {
        let factory = ShardedPublisherFactory::new(quick());
        let a = factory.apply(EventType::of::<Registered>(), 8);
        let b = factory.apply(EventType::of::<Disconnected>(), 8);
        assert!(Arc::ptr_eq(&a, &b));

        let family = EventType::of::<Registered>().family().to_string();
        assert_eq!(factory.shard_keys(), vec![family.clone()]);
        assert_eq!(a.name(), family);
        assert!(factory.shard(&family).is_some());
        a.shutdown();
    }

    #[tokio::test]
    async fn custom_resolver_splits_shards() {
        let factory = ShardedPublisherFactory::with_resolver(quick(), |t| {
            if t.simple_name().starts_with("Dis") {
                "connection".to_string()
            } else {
                "operation".to_string()
            }
        });
        let op = factory.apply(EventType::of::<Registered>(), 8);
        let conn = factory.apply(EventType::of::<Disconnected>(), 8);
        assert!(!Arc::ptr_eq(&op, &conn));
        assert_eq!(factory.shard_keys(), vec!["connection", "operation"]);
        op.shutdown();
        conn.shutdown();
    }
}
