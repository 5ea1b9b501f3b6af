use super::types::ChangeNotification;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Error surfaced by a subscriber callback. Logged by the bus, never
/// propagated to the publisher.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// An internal consumer of change notifications.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Stable name used when logging delivery failures.
    fn name(&self) -> &str;

    async fn notify(&self, notification: ChangeNotification) -> Result<(), SubscriberError>;
}

/// Handle returned by [`NotificationBus::subscribe`]; pass it back to
/// [`NotificationBus::unsubscribe`] to remove the registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// In-process publish/subscribe hub.
///
/// Publishing dispatches to a snapshot of the subscriber list taken at
/// call time; subscribers added or removed mid-dispatch only affect
/// subsequent rounds. A failing subscriber neither cancels nor fails
/// its siblings, and `publish` itself never fails.
#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    subscribers: RwLock<Vec<(SubscriberId, Arc<dyn Subscriber>)>>,
    next_id: AtomicU64,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub async fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.inner.subscribers.write().await;
        subscribers.push((id, subscriber));
        info!(total = subscribers.len(), "subscriber added");
        id
    }

    /// Remove a subscriber. Unknown ids are a no-op.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        let mut subscribers = self.inner.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|(subscriber_id, _)| *subscriber_id != id);
        if subscribers.len() != before {
            info!(total = subscribers.len(), "subscriber removed");
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().await.len()
    }

    /// Fan a notification out to every current subscriber and wait for
    /// all dispatches to settle.
    pub async fn publish(&self, notification: ChangeNotification) {
        let snapshot: Vec<(SubscriberId, Arc<dyn Subscriber>)> =
            self.inner.subscribers.read().await.clone();
        if snapshot.is_empty() {
            return;
        }

        let dispatches = snapshot.iter().map(|(_, subscriber)| {
            let subscriber = Arc::clone(subscriber);
            let notification = notification.clone();
            async move {
                let outcome = subscriber.notify(notification).await;
                (subscriber, outcome)
            }
        });

        for (subscriber, outcome) in join_all(dispatches).await {
            if let Err(e) = outcome {
                error!(
                    subscriber = subscriber.name(),
                    error = %e,
                    "subscriber delivery failed"
                );
            }
        }

        debug!(
            change_id = notification.change_id,
            subscribers = snapshot.len(),
            "notification dispatched"
        );
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSubscriber;
    use orderstream_sdk::objects::ws::ChangeOperation;

    fn notification(change_id: i64) -> ChangeNotification {
        ChangeNotification {
            change_id,
            order_id: 1,
            operation: ChangeOperation::Update,
            order: None,
            previous_data: None,
            changed_at: time::OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let bus = NotificationBus::new();
        bus.publish(notification(1)).await;
        bus.publish(notification(2)).await;
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn unsubscribe_of_unknown_id_leaves_the_count_unchanged() {
        let bus = NotificationBus::new();
        let first = bus.subscribe(RecordingSubscriber::new()).await;
        let second = bus.subscribe(RecordingSubscriber::new()).await;

        bus.unsubscribe(first).await;
        assert_eq!(bus.subscriber_count().await, 1);

        // Removing the same id twice changes nothing.
        bus.unsubscribe(first).await;
        assert_eq!(bus.subscriber_count().await, 1);

        bus.unsubscribe(second).await;
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn a_failing_subscriber_does_not_affect_its_siblings() {
        let bus = NotificationBus::new();
        let failing = RecordingSubscriber::failing();
        let healthy = RecordingSubscriber::new();
        bus.subscribe(failing.clone()).await;
        bus.subscribe(healthy.clone()).await;

        bus.publish(notification(1)).await;
        bus.publish(notification(2)).await;

        assert_eq!(failing.count(), 2);
        assert_eq!(healthy.count(), 2);
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_notification() {
        let bus = NotificationBus::new();
        let subscriber = RecordingSubscriber::new();
        bus.subscribe(subscriber.clone()).await;

        for change_id in 1..=5 {
            bus.publish(notification(change_id)).await;
        }

        let seen = subscriber.notifications.lock().await;
        let ids: Vec<i64> = seen.iter().map(|n| n.change_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }
}
