//! End-to-end delivery through the public `Bus` API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use notify_bus::{
    Bus, BusConfig, DefaultPublisherFactory, Event, EventType, Stamp, Subscriber, Subscription,
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn config(buffer_size: usize) -> BusConfig {
    BusConfig {
        buffer_size,
        grace_ticks: 60,
        grace_tick: Duration::from_millis(20),
    }
}

#[derive(Debug)]
struct ServiceChanged {
    stamp: Stamp,
    service: &'static str,
}

impl ServiceChanged {
    fn new(service: &'static str) -> Self {
        Self {
            stamp: Stamp::next(),
            service,
        }
    }
}

impl Event for ServiceChanged {
    fn sequence(&self) -> u64 {
        self.stamp.seq()
    }
}

#[derive(Debug)]
struct ClientDisconnected(Stamp);

impl Event for ClientDisconnected {
    fn sequence(&self) -> u64 {
        self.0.seq()
    }
}

struct Collector {
    subscription: Subscription,
    events: Mutex<Vec<Arc<dyn Event>>>,
}

impl Collector {
    fn new(subscription: Subscription) -> Arc<Self> {
        Arc::new(Self {
            subscription,
            events: Mutex::new(Vec::new()),
        })
    }

    fn events(&self) -> Vec<Arc<dyn Event>> {
        self.events.lock().unwrap().clone()
    }

    fn sequences(&self) -> Vec<u64> {
        self.events().iter().map(|e| e.sequence()).collect()
    }

    async fn wait_for(&self, n: usize) -> anyhow::Result<()> {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.events.lock().unwrap().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;
        Ok(())
    }
}

impl Subscriber for Collector {
    fn subscription(&self) -> Subscription {
        self.subscription.clone()
    }

    fn on_event(&self, event: &Arc<dyn Event>) {
        self.events.lock().unwrap().push(Arc::clone(event));
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

#[tokio::test]
async fn late_subscriber_gets_queued_events_only() -> anyhow::Result<()> {
    init_tracing();
    let bus = Bus::new(config(1024));
    let factory = DefaultPublisherFactory::new(config(1024));
    bus.register_to_publisher(EventType::of::<ServiceChanged>(), &factory, 2)?;

    // Single-threaded runtime: nothing is dequeued before the first await.
    let events: Vec<Arc<dyn Event>> = (0..5)
        .map(|_| Arc::new(ServiceChanged::new("orders")) as Arc<dyn Event>)
        .collect();
    for ev in &events {
        assert!(bus.publish(Arc::clone(ev))?);
    }

    let collector = Collector::new(Subscription::to::<ServiceChanged>());
    bus.register_subscriber(collector.clone())?;
    collector.wait_for(2).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The three overflowing events went through the fallback while nobody listened.
    let expected: Vec<u64> = events[..2].iter().map(|e| e.sequence()).collect();
    assert_eq!(collector.sequences(), expected);
    bus.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn multi_type_subscriber_sees_the_published_instances() -> anyhow::Result<()> {
    init_tracing();
    let bus = Bus::new(config(64));
    let collector = Collector::new(Subscription::many([
        EventType::of::<ServiceChanged>(),
        EventType::of::<ClientDisconnected>(),
    ]));
    bus.register_subscriber(collector.clone())?;

    let a: Arc<dyn Event> = Arc::new(ServiceChanged::new("payments"));
    let b: Arc<dyn Event> = Arc::new(ClientDisconnected(Stamp::next()));
    bus.publish(Arc::clone(&a))?;
    bus.publish(Arc::clone(&b))?;

    collector.wait_for(2).await?;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let seen = collector.events();
    assert_eq!(seen.len(), 2);
    let a_seen = seen.iter().find(|e| e.is::<ServiceChanged>()).unwrap();
    let b_seen = seen.iter().find(|e| e.is::<ClientDisconnected>()).unwrap();
    assert!(Arc::ptr_eq(a_seen, &a));
    assert!(Arc::ptr_eq(b_seen, &b));
    assert_eq!(
        a_seen.downcast_ref::<ServiceChanged>().map(|e| e.service),
        Some("payments")
    );
    bus.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn saturated_queue_loses_nothing() -> anyhow::Result<()> {
    init_tracing();
    let bus = Bus::new(config(4));
    let collector = Collector::new(Subscription::to::<ServiceChanged>());
    bus.register_subscriber(collector.clone())?;

    let mut producers = Vec::new();
    for _ in 0..4 {
        let bus = bus.clone();
        producers.push(tokio::spawn(async move {
            for _ in 0..50 {
                bus.publish_event(ServiceChanged::new("inventory")).unwrap();
            }
        }));
    }
    for p in producers {
        p.await?;
    }

    collector.wait_for(200).await?;
    let mut seen = collector.sequences();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 200);
    bus.shutdown();
    Ok(())
}

#[tokio::test]
async fn expired_events_are_skipped_for_opted_in_subscribers() -> anyhow::Result<()> {
    init_tracing();
    let bus = Bus::new(config(16));
    let strict = Collector::new(Subscription::to::<ServiceChanged>().ignore_expired());
    let lenient = Collector::new(Subscription::to::<ServiceChanged>());
    bus.register_subscriber(strict.clone())?;
    bus.register_subscriber(lenient.clone())?;

    let older: Arc<dyn Event> = Arc::new(ServiceChanged::new("orders"));
    let newer: Arc<dyn Event> = Arc::new(ServiceChanged::new("orders"));
    bus.publish(Arc::clone(&newer))?;
    bus.publish(Arc::clone(&older))?;

    lenient.wait_for(2).await?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(lenient.sequences(), vec![newer.sequence(), older.sequence()]);
    assert_eq!(strict.sequences(), vec![newer.sequence()]);

    let publisher = bus.publisher(EventType::of::<ServiceChanged>()).unwrap();
    assert_eq!(publisher.last_dispatched_sequence(), newer.sequence());
    bus.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn executor_subscriber_runs_off_the_publisher_task() -> anyhow::Result<()> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("side-executor")
        .build()?;

    struct ThreadProbe {
        executor: tokio::runtime::Handle,
        hits: AtomicUsize,
        thread: Mutex<Option<String>>,
    }

    impl Subscriber for ThreadProbe {
        fn subscription(&self) -> Subscription {
            Subscription::to::<ClientDisconnected>().on(self.executor.clone())
        }
        fn on_event(&self, _event: &Arc<dyn Event>) {
            *self.thread.lock().unwrap() = std::thread::current().name().map(String::from);
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    let probe = Arc::new(ThreadProbe {
        executor: runtime.handle().clone(),
        hits: AtomicUsize::new(0),
        thread: Mutex::new(None),
    });
    let bus = Bus::new(config(16));
    bus.register_subscriber(probe.clone())?;
    bus.publish_event(ClientDisconnected(Stamp::next()))?;

    tokio::time::timeout(Duration::from_secs(5), async {
        while probe.hits.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    assert_eq!(
        probe.thread.lock().unwrap().as_deref(),
        Some("side-executor")
    );

    bus.shutdown();
    runtime.shutdown_background();
    Ok(())
}

#[tokio::test]
async fn shutdown_while_idle_stops_delivery() -> anyhow::Result<()> {
    init_tracing();
    let bus = Bus::new(config(16));
    let collector = Collector::new(Subscription::to::<ServiceChanged>());
    bus.register_subscriber(collector.clone())?;

    bus.publish_event(ServiceChanged::new("orders"))?;
    collector.wait_for(1).await?;

    let publisher = bus.publisher(EventType::of::<ServiceChanged>()).unwrap();
    bus.shutdown();
    assert!(publisher.is_shutdown());
    assert!(publisher.status().contains("shutdown= true"));

    for _ in 0..5 {
        assert!(bus.publish_event(ServiceChanged::new("orders"))?);
        assert!(publisher.publish(Arc::new(ServiceChanged::new("orders")))?);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(collector.events().len(), 1);
    Ok(())
}

#[tokio::test]
async fn statuses_list_every_publisher_once() -> anyhow::Result<()> {
    init_tracing();
    let bus = Bus::new(config(8));
    bus.register_subscriber(Collector::new(Subscription::many([
        EventType::of::<ServiceChanged>(),
        EventType::of::<ClientDisconnected>(),
    ])))?;

    let statuses = bus.statuses();
    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].starts_with("Publisher ClientDisconnected"));
    assert!(statuses[1].starts_with("Publisher ServiceChanged"));
    bus.shutdown();
    Ok(())
}
