//! In-process event broker
//!
//! ```text
//! SettlementCoordinator (publish after commit)
//!        │
//!        └── Broker
//!               ├── mpsc ──► PaymentWorker        (order-created)
//!               └── mpsc ──► NotificationDispatcher (terminal topics)
//! ```
//!
//! ## Delivery contract
//!
//! - At-least-once: `publish` blocks until every subscriber channel has
//!   accepted the event, and a failing handler is redelivered with
//!   exponential backoff before it dead-letters.
//! - Ordering: each consumer drains one mpsc channel sequentially, so
//!   events sharing an order_id are handled in publication order. No
//!   ordering holds across different consumers.
//!
//! Consumers must therefore tolerate redelivery; dedupe is their job.

use async_trait::async_trait;
use dashmap::DashMap;
use shared::event::{DomainEvent, Topic};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const CONSUMER_BUFFER: usize = 256;

/// Redelivery policy for failing handlers
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total delivery attempts before dead-lettering
    pub max_attempts: u32,
    /// First retry delay
    pub base_delay: Duration,
    /// Backoff cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: delay = base * 2^attempt, capped at max
    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        scaled.min(self.max_delay)
    }
}

/// An event that exhausted its delivery attempts for one consumer
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub consumer: &'static str,
    pub event: DomainEvent,
    pub attempts: u32,
    pub last_error: String,
    pub failed_at: i64,
}

/// A broker subscriber
///
/// `handle` returning Err triggers redelivery, so implementations must be
/// idempotent against replays of the same event_id.
#[async_trait]
pub trait EventConsumer: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Topics this consumer subscribes to
    fn topics(&self) -> &'static [Topic];

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

struct BrokerInner {
    subscribers: DashMap<Topic, Vec<mpsc::Sender<Arc<DomainEvent>>>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

/// Topic-based event broker
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                subscribers: DashMap::new(),
                dead_letters: Mutex::new(Vec::new()),
                retry,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Register a consumer and spawn its delivery loop
    ///
    /// One channel per consumer keeps its deliveries strictly sequential.
    pub fn spawn_consumer(&self, consumer: Arc<dyn EventConsumer>) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::channel::<Arc<DomainEvent>>(CONSUMER_BUFFER);
        for topic in consumer.topics() {
            self.inner
                .subscribers
                .entry(*topic)
                .or_default()
                .push(tx.clone());
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tracing::info!(consumer = consumer.name(), "Consumer started");
            loop {
                tokio::select! {
                    _ = inner.cancel.cancelled() => {
                        tracing::info!(consumer = consumer.name(), "Consumer stopping");
                        break;
                    }
                    event_opt = rx.recv() => {
                        match event_opt {
                            Some(event) => Self::deliver(&inner, consumer.as_ref(), &event).await,
                            None => {
                                tracing::info!(consumer = consumer.name(), "Channel closed, consumer stopping");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }

    /// Deliver one event with bounded retries, dead-lettering on exhaustion
    async fn deliver(inner: &BrokerInner, consumer: &dyn EventConsumer, event: &DomainEvent) {
        let mut last_error = String::new();
        for attempt in 0..inner.retry.max_attempts {
            match consumer.handle(event).await {
                Ok(()) => return,
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(
                        consumer = consumer.name(),
                        event_id = %event.event_id,
                        order_id = %event.order_id,
                        attempt = attempt + 1,
                        error = %last_error,
                        "Event handling failed"
                    );
                    if attempt + 1 < inner.retry.max_attempts {
                        tokio::time::sleep(inner.retry.delay_for(attempt)).await;
                    }
                }
            }
        }

        tracing::error!(
            consumer = consumer.name(),
            event_id = %event.event_id,
            order_id = %event.order_id,
            attempts = inner.retry.max_attempts,
            "Delivery attempts exhausted, moving to dead letter queue"
        );
        if let Ok(mut queue) = inner.dead_letters.lock() {
            queue.push(DeadLetter {
                consumer: consumer.name(),
                event: event.clone(),
                attempts: inner.retry.max_attempts,
                last_error,
                failed_at: shared::util::now_millis(),
            });
        }
    }

    /// Publish an event to every subscriber of its topic
    ///
    /// Blocks when a subscriber channel is full rather than dropping;
    /// a closed channel means the consumer is gone and is logged.
    pub async fn publish(&self, event: DomainEvent) {
        let topic = event.topic();
        let senders = match self.inner.subscribers.get(&topic) {
            Some(entry) => entry.clone(),
            None => {
                tracing::debug!(topic = %topic, event_id = %event.event_id, "No subscribers");
                return;
            }
        };

        let event = Arc::new(event);
        for tx in &senders {
            if tx.send(Arc::clone(&event)).await.is_err() {
                tracing::error!(
                    topic = %topic,
                    event_id = %event.event_id,
                    "Subscriber channel closed, event not delivered"
                );
            }
        }
    }

    /// Snapshot of the dead letter queue
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner
            .dead_letters
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }

    /// Stop all consumer loops
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::event::{EventKind, EventPayload};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn settled_event(order_id: &str) -> DomainEvent {
        DomainEvent::new(
            EventKind::OrderSettled,
            order_id.to_string(),
            EventPayload::OrderSettled {
                customer_id: "cust-1".to_string(),
                payment_id: "pay_1".to_string(),
                total_amount: rust_decimal::Decimal::new(500, 2),
            },
        )
    }

    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventConsumer for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn topics(&self) -> &'static [Topic] {
            &[Topic::OrderSettled]
        }

        async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(event.event_id.clone());
            Ok(())
        }
    }

    struct Flaky {
        failures: AtomicU32,
        handled: AtomicU32,
    }

    #[async_trait]
    impl EventConsumer for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn topics(&self) -> &'static [Topic] {
            &[Topic::OrderSettled]
        }

        async fn handle(&self, _event: &DomainEvent) -> anyhow::Result<()> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n > 0 { Some(n - 1) } else { None }
            }).is_ok()
            {
                anyhow::bail!("transient failure");
            }
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_delivery_preserves_order() {
        let broker = Broker::new(fast_retry(3));
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        broker.spawn_consumer(recorder.clone());

        let events: Vec<DomainEvent> = (0..5).map(|_| settled_event("order-1")).collect();
        let expected: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();
        for event in events {
            broker.publish(event).await;
        }

        wait_until(|| recorder.seen.lock().unwrap().len() == 5).await;
        assert_eq!(*recorder.seen.lock().unwrap(), expected);
        broker.shutdown();
    }

    #[tokio::test]
    async fn test_redelivery_until_success() {
        let broker = Broker::new(fast_retry(5));
        let flaky = Arc::new(Flaky {
            failures: AtomicU32::new(2),
            handled: AtomicU32::new(0),
        });
        broker.spawn_consumer(flaky.clone());

        broker.publish(settled_event("order-1")).await;

        wait_until(|| flaky.handled.load(Ordering::SeqCst) == 1).await;
        assert!(broker.dead_letters().is_empty());
        broker.shutdown();
    }

    #[tokio::test]
    async fn test_dead_letter_after_exhaustion() {
        let broker = Broker::new(fast_retry(2));
        let flaky = Arc::new(Flaky {
            failures: AtomicU32::new(u32::MAX),
            handled: AtomicU32::new(0),
        });
        broker.spawn_consumer(flaky.clone());

        let event = settled_event("order-1");
        let event_id = event.event_id.clone();
        broker.publish(event).await;

        wait_until(|| !broker.dead_letters().is_empty()).await;
        let dead = broker.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].consumer, "flaky");
        assert_eq!(dead[0].event.event_id, event_id);
        assert_eq!(dead[0].attempts, 2);
        assert_eq!(flaky.handled.load(Ordering::SeqCst), 0);
        broker.shutdown();
    }

    #[tokio::test]
    async fn test_topic_filtering() {
        let broker = Broker::new(fast_retry(3));
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        broker.spawn_consumer(recorder.clone());

        // Not subscribed to order-created
        broker
            .publish(DomainEvent::new(
                EventKind::OrderCreated,
                "order-1".to_string(),
                EventPayload::OrderCreated {
                    customer_id: "cust-1".to_string(),
                    total_amount: rust_decimal::Decimal::new(500, 2),
                    currency: "EUR".to_string(),
                },
            ))
            .await;
        broker.publish(settled_event("order-1")).await;

        wait_until(|| recorder.seen.lock().unwrap().len() == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
        broker.shutdown();
    }
}
