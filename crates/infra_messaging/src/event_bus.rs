//! In-process event bus
//!
//! # Delivery model
//!
//! ```text
//!   publish(ctx, event)
//!        │  (matching subscriptions, cloned under a short read lock)
//!        ├──► [bounded queue] ──► drain task ──► handler "audit"
//!        └──► [bounded queue] ──► drain task ──► handler "notifications"
//! ```
//!
//! `publish` returns once the event sits in every matching queue. Each drain
//! task delivers sequentially, so a handler observes one publisher's events
//! in publish order. A handler error or panic is logged and the event is not
//! retried.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use core_kernel::{
    Context, DomainEvent, EventHandler, EventPublisher, HandlerError, HealthCheckResult,
    HealthCheckable, PortError,
};

use crate::error::MessagingError;

/// Event bus tuning
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Capacity of each subscription's queue; publishers wait when it is full
    pub buffer_size: usize,
    /// Upper bound on how long `close` waits for queues to drain
    pub drain_timeout: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

/// Counters exposed for health and monitoring
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EventBusStats {
    pub published: u64,
    pub delivered: u64,
    pub handler_failures: u64,
    pub subscribers: usize,
}

/// Outcome of closing the bus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Subscriptions whose queues emptied before the timeout
    pub drained: usize,
    /// Subscriptions aborted at the timeout
    pub aborted: usize,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    handler_failures: AtomicU64,
}

struct Subscription {
    /// Empty means every event type
    event_types: HashSet<String>,
    sender: mpsc::Sender<Arc<DomainEvent>>,
    worker: JoinHandle<()>,
}

impl Subscription {
    fn accepts(&self, event_type: &str) -> bool {
        self.event_types.is_empty() || self.event_types.contains(event_type)
    }
}

/// Publish/subscribe by event type
pub struct EventBus {
    config: EventBusConfig,
    subscriptions: RwLock<HashMap<String, Subscription>>,
    closed: AtomicBool,
    counters: Arc<Counters>,
}

impl EventBus {
    /// Creates an empty bus
    pub fn new(config: EventBusConfig) -> Self {
        Self {
            config,
            subscriptions: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Registers a named handler for the given event types
    ///
    /// An empty `event_types` slice subscribes to every event. Must be called
    /// from within a tokio runtime; the subscription's drain task is spawned
    /// immediately.
    ///
    /// # Errors
    ///
    /// `AlreadySubscribed` if `name` is taken, `Closed` after [`EventBus::close`].
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// bus.subscribe("audit", Arc::new(LoggingHandler), &[])?;
    /// bus.subscribe("renewals", handler, &["policy.renewed", "policy.created"])?;
    /// ```
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        event_types: &[&str],
    ) -> Result<(), MessagingError> {
        let name = name.into();
        let mut subscriptions = self.subscriptions.write().unwrap_or_else(|e| e.into_inner());
        if self.closed.load(Ordering::SeqCst) {
            return Err(MessagingError::Closed("event bus"));
        }
        if subscriptions.contains_key(&name) {
            return Err(MessagingError::AlreadySubscribed(name));
        }

        let (sender, receiver) = mpsc::channel(self.config.buffer_size.max(1));
        let worker = tokio::spawn(drain_subscription(
            name.clone(),
            handler,
            receiver,
            Arc::clone(&self.counters),
        ));
        let event_types: HashSet<String> = event_types.iter().map(|t| t.to_string()).collect();

        info!(handler = %name, event_types = ?event_types, "Event handler subscribed");
        subscriptions.insert(name, Subscription { event_types, sender, worker });
        Ok(())
    }

    /// Removes a handler; events already queued for it are still delivered
    pub fn unsubscribe(&self, name: &str) -> Result<(), MessagingError> {
        let removed = self
            .subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        match removed {
            // Dropping the sender lets the drain task finish its backlog and exit.
            Some(_) => {
                info!(handler = %name, "Event handler unsubscribed");
                Ok(())
            }
            None => Err(MessagingError::NotSubscribed(name.to_string())),
        }
    }

    /// Names of the current subscriptions
    pub fn subscribers(&self) -> Vec<String> {
        let subscriptions = self.subscriptions.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = subscriptions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            handler_failures: self.counters.handler_failures.load(Ordering::Relaxed),
            subscribers: self.subscriptions.read().unwrap_or_else(|e| e.into_inner()).len(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops accepting events and waits (bounded) for every queue to drain
    pub async fn close(&self) -> DrainReport {
        self.closed.store(true, Ordering::SeqCst);
        let subscriptions: Vec<(String, Subscription)> = self
            .subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect();

        let deadline = tokio::time::Instant::now() + self.config.drain_timeout;
        let mut report = DrainReport::default();
        for (name, subscription) in subscriptions {
            let Subscription { sender, mut worker, .. } = subscription;
            drop(sender);
            match tokio::time::timeout_at(deadline, &mut worker).await {
                Ok(_) => report.drained += 1,
                Err(_) => {
                    warn!(handler = %name, "Event handler did not drain before timeout; aborting");
                    worker.abort();
                    report.aborted += 1;
                }
            }
        }
        info!(drained = report.drained, aborted = report.aborted, "Event bus closed");
        report
    }

    fn matching_senders(&self, event_type: &str) -> Vec<(String, mpsc::Sender<Arc<DomainEvent>>)> {
        self.subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, s)| s.accepts(event_type))
            .map(|(name, s)| (name.clone(), s.sender.clone()))
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, ctx: &Context, event: DomainEvent) -> Result<(), PortError> {
        ctx.check()?;
        if self.is_closed() {
            return Err(MessagingError::Closed("event bus").into());
        }

        let event_type = event.event_type();
        let event = Arc::new(event);
        let targets = self.matching_senders(event_type);
        debug!(event_type, event_id = %event.id, handlers = targets.len(), "Publishing event");

        for (name, sender) in targets {
            match ctx.run(sender.send(Arc::clone(&event))).await? {
                Ok(()) => {}
                // The handler unsubscribed between lookup and send.
                Err(_) => debug!(handler = %name, event_type, "Subscription gone; event skipped"),
            }
        }
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl HealthCheckable for EventBus {
    async fn health_check(&self) -> HealthCheckResult {
        if self.is_closed() {
            HealthCheckResult::unhealthy("event-bus", 0, "event bus is closed")
        } else {
            HealthCheckResult::healthy("event-bus", 0)
        }
    }
}

async fn drain_subscription(
    name: String,
    handler: Arc<dyn EventHandler>,
    mut receiver: mpsc::Receiver<Arc<DomainEvent>>,
    counters: Arc<Counters>,
) {
    while let Some(event) = receiver.recv().await {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(handler.handle(&event)).catch_unwind().await;
        match outcome {
            Ok(Ok(())) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(
                    handler = %name,
                    event_type = event.event_type(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Event delivered"
                );
            }
            Ok(Err(e)) => {
                counters.handler_failures.fetch_add(1, Ordering::Relaxed);
                warn!(handler = %name, event_type = event.event_type(), event_id = %event.id, error = %e, "Event handler failed");
            }
            Err(_) => {
                counters.handler_failures.fetch_add(1, Ordering::Relaxed);
                error!(handler = %name, event_type = event.event_type(), event_id = %event.id, "Event handler panicked");
            }
        }
    }
    debug!(handler = %name, "Event subscription drained");
}

/// Logs every event it receives; used as the audit-trail subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        info!(
            event_type = event.event_type(),
            event_id = %event.id,
            aggregate_id = %event.aggregate_id,
            occurred_at = %event.occurred_at,
            "Domain event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{CustomerId, EventPayload};
    use tokio::sync::Mutex;

    struct Collect(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl EventHandler for Collect {
        async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
            self.0.lock().await.push(event.event_type().to_string());
            Ok(())
        }
    }

    fn registered() -> DomainEvent {
        let user_id = CustomerId::new();
        DomainEvent::new(user_id, EventPayload::UserRegistered {
            user_id,
            email: "x@example.com".to_string(),
        })
    }

    #[tokio::test]
    async fn test_duplicate_subscription_rejected() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe("a", Arc::new(Collect(seen.clone())), &[]).unwrap();
        let err = bus.subscribe("a", Arc::new(Collect(seen)), &[]).unwrap_err();
        assert!(matches!(err, MessagingError::AlreadySubscribed(_)));
    }

    #[tokio::test]
    async fn test_publish_after_close_fails() {
        let bus = EventBus::default();
        bus.close().await;
        let err = bus.publish(&Context::background(), registered()).await.unwrap_err();
        assert!(matches!(err, PortError::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_type_filter() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe("policies", Arc::new(Collect(seen.clone())), &["policy.created"]).unwrap();

        bus.publish(&Context::background(), registered()).await.unwrap();
        bus.close().await;

        assert!(seen.lock().await.is_empty());
    }
}
