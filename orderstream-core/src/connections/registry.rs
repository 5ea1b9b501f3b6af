use super::transport::ConnectionSink;
use crate::events::{ChangeNotification, Subscriber, SubscriberError};
use crate::store::OrderStore;
use async_trait::async_trait;
use futures_util::future::join_all;
use orderstream_sdk::objects::order::OrderSnapshot;
use orderstream_sdk::objects::ws::{OrderChangePayload, WsServerMessage, WsServerPayload};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Stable identity of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Connection {
    sink: Arc<dyn ConnectionSink>,
    connected_at: time::OffsetDateTime,
    client_info: String,
}

/// Read-only view returned by [`ConnectionRegistry::get_stats`].
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    pub total_connections: usize,
    pub connections: Vec<ConnectionInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    #[serde(with = "time::serde::rfc3339")]
    pub connected_at: time::OffsetDateTime,
    pub client_info: String,
}

/// Owns every live client connection for its whole lifetime.
///
/// A connection is either present in the map (connected) or absent
/// (disconnected, terminal); there is no reconnect state. Clients
/// reconnect by opening a fresh transport and receiving a fresh initial
/// snapshot.
///
/// Fan-out always iterates a point-in-time copy of the connection set
/// and applies failure-triggered removals only after the whole round
/// has settled, so the live set is never mutated mid-iteration.
pub struct ConnectionRegistry {
    orders: Arc<dyn OrderStore>,
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self {
            orders,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register an accepted transport and send it the initial snapshot.
    ///
    /// A snapshot fetch failure is reported to the client as an `error`
    /// frame in place of the data; a failed send is logged but does not
    /// remove the connection on its own (the receive loop or the next
    /// broadcast will).
    pub async fn connect(
        &self,
        sink: Arc<dyn ConnectionSink>,
        client_info: impl Into<String>,
    ) -> ConnectionId {
        let id = ConnectionId::new();
        let client_info = client_info.into();
        let total = {
            let mut connections = self.connections.write().await;
            connections.insert(
                id,
                Connection {
                    sink: Arc::clone(&sink),
                    connected_at: time::OffsetDateTime::now_utc(),
                    client_info: client_info.clone(),
                },
            );
            connections.len()
        };
        info!(connection = %id, total, client = %client_info, "client connected");

        self.send_initial_data(&sink).await;
        id
    }

    async fn send_initial_data(&self, sink: &Arc<dyn ConnectionSink>) {
        let message = match self.orders.all_orders().await {
            Ok(orders) => {
                let snapshots: Vec<OrderSnapshot> =
                    orders.iter().map(OrderSnapshot::from).collect();
                debug!(orders = snapshots.len(), "sending initial snapshot");
                WsServerMessage::initial_data(snapshots)
            }
            Err(e) => {
                error!(error = %e, "failed to load initial snapshot");
                WsServerMessage::error("Failed to load initial data")
            }
        };

        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "failed to serialize initial snapshot");
                return;
            }
        };
        if let Err(e) = sink.send_text(&text).await {
            warn!(error = %e, "initial snapshot send failed");
        }
    }

    /// Remove a connection. Unknown ids are a no-op.
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if connections.remove(&id).is_some() {
            info!(connection = %id, total = connections.len(), "client disconnected");
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Broadcast one observed change to every connection.
    pub async fn broadcast_change(&self, notification: &ChangeNotification) {
        let message = WsServerMessage::now(WsServerPayload::OrderChange(OrderChangePayload {
            change_id: notification.change_id,
            order_id: notification.order_id,
            operation: notification.operation,
            order_data: notification.order.as_ref().map(OrderSnapshot::from),
            previous_data: notification.previous_data.clone(),
            timestamp: notification.changed_at,
        }));
        let delivered = self.broadcast(&message).await;
        if delivered > 0 {
            info!(
                operation = %notification.operation,
                order_id = notification.order_id,
                clients = delivered,
                "change broadcast"
            );
        }
    }

    /// Broadcast a heartbeat frame. With no connections this performs no
    /// network activity at all.
    pub async fn send_heartbeat(&self) {
        if self.connection_count().await == 0 {
            return;
        }
        self.broadcast(&WsServerMessage::heartbeat()).await;
    }

    /// Serialize `message` once and deliver it to every connection
    /// concurrently. Connections whose send fails are removed after all
    /// delivery attempts have settled. Returns the number of successful
    /// deliveries.
    pub async fn broadcast(&self, message: &WsServerMessage) -> usize {
        let snapshot: Vec<(ConnectionId, Arc<dyn ConnectionSink>)> = {
            let connections = self.connections.read().await;
            connections
                .iter()
                .map(|(id, connection)| (*id, Arc::clone(&connection.sink)))
                .collect()
        };
        if snapshot.is_empty() {
            return 0;
        }

        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "failed to serialize broadcast message");
                return 0;
            }
        };

        let attempts = snapshot.iter().map(|(id, sink)| {
            let id = *id;
            let sink = Arc::clone(sink);
            let text = text.as_str();
            async move { (id, sink.send_text(text).await) }
        });

        let mut failed = Vec::new();
        let mut delivered = 0usize;
        for (id, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        connection = %id,
                        error = %e,
                        "broadcast send failed, dropping connection"
                    );
                    failed.push(id);
                }
            }
        }

        for id in failed {
            self.disconnect(id).await;
        }

        delivered
    }

    /// Point-in-time view of the connection set. Pure query.
    pub async fn get_stats(&self) -> ConnectionStats {
        let connections = self.connections.read().await;
        ConnectionStats {
            total_connections: connections.len(),
            connections: connections
                .values()
                .map(|connection| ConnectionInfo {
                    connected_at: connection.connected_at,
                    client_info: connection.client_info.clone(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl Subscriber for ConnectionRegistry {
    fn name(&self) -> &str {
        "connection-registry"
    }

    async fn notify(&self, notification: ChangeNotification) -> Result<(), SubscriberError> {
        self.broadcast_change(&notification).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::OrderStatus;
    use crate::test_support::{MemoryRecordStore, MockSink, order};
    use orderstream_sdk::objects::ws::ChangeOperation;
    use std::sync::atomic::Ordering;

    fn update_notification(change_id: i64, order: crate::entities::Order) -> ChangeNotification {
        ChangeNotification {
            change_id,
            order_id: order.id,
            operation: ChangeOperation::Update,
            order: Some(order),
            previous_data: None,
            changed_at: time::OffsetDateTime::now_utc(),
        }
    }

    fn frame_value(frame: &str) -> serde_json::Value {
        serde_json::from_str(frame).unwrap()
    }

    #[tokio::test]
    async fn connect_sends_one_initial_snapshot_with_every_order() {
        let store = MemoryRecordStore::new();
        store.push_order(order(1, OrderStatus::Pending)).await;
        store.push_order(order(2, OrderStatus::Shipped)).await;
        let registry = ConnectionRegistry::new(store);

        let sink = MockSink::new();
        registry.connect(sink.clone(), "test-client").await;

        let frames = sink.sent_frames().await;
        assert_eq!(frames.len(), 1);
        let value = frame_value(&frames[0]);
        assert_eq!(value["type"], "initial_data");
        assert_eq!(value["data"]["orders"].as_array().unwrap().len(), 2);
        assert!(value["timestamp"].is_string());
    }

    #[tokio::test]
    async fn initial_snapshot_precedes_any_change_frame() {
        let store = MemoryRecordStore::new();
        store.push_order(order(1, OrderStatus::Pending)).await;
        let registry = ConnectionRegistry::new(store);

        let sink = MockSink::new();
        registry.connect(sink.clone(), "test-client").await;
        registry
            .broadcast_change(&update_notification(7, order(1, OrderStatus::Shipped)))
            .await;

        let frames = sink.sent_frames().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frame_value(&frames[0])["type"], "initial_data");
        assert_eq!(frame_value(&frames[1])["type"], "order_change");
    }

    #[tokio::test]
    async fn snapshot_fetch_failure_sends_error_and_keeps_the_connection() {
        let store = MemoryRecordStore::new();
        store.fail_all_orders.store(true, Ordering::SeqCst);
        let registry = ConnectionRegistry::new(store);

        let sink = MockSink::new();
        registry.connect(sink.clone(), "test-client").await;

        let frames = sink.sent_frames().await;
        assert_eq!(frames.len(), 1);
        let value = frame_value(&frames[0]);
        assert_eq!(value["type"], "error");
        assert!(value["data"]["message"].is_string());
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn failed_send_removes_only_that_connection_after_the_round() {
        let store = MemoryRecordStore::new();
        let registry = ConnectionRegistry::new(store);

        let healthy = MockSink::new();
        let broken = MockSink::failing();
        let healthy_id = registry.connect(healthy.clone(), "healthy").await;
        let broken_id = registry.connect(broken.clone(), "broken").await;
        assert_eq!(registry.connection_count().await, 2);

        registry.send_heartbeat().await;

        // Only the broken connection was removed.
        assert_eq!(registry.connection_count().await, 1);
        let frames = healthy.sent_frames().await;
        assert_eq!(frame_value(frames.last().unwrap())["type"], "heartbeat");

        // disconnect stays idempotent with the removal already applied.
        registry.disconnect(broken_id).await;
        registry.disconnect(healthy_id).await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn heartbeat_with_no_connections_touches_no_transport() {
        let store = MemoryRecordStore::new();
        let registry = ConnectionRegistry::new(store);
        registry.send_heartbeat().await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn heartbeat_reaches_every_connection_identically() {
        let store = MemoryRecordStore::new();
        let registry = ConnectionRegistry::new(store);
        let first = MockSink::new();
        let second = MockSink::new();
        registry.connect(first.clone(), "first").await;
        registry.connect(second.clone(), "second").await;

        registry.send_heartbeat().await;

        let first_frames = first.sent_frames().await;
        let second_frames = second.sent_frames().await;
        assert_eq!(first_frames.len(), 2);
        assert_eq!(second_frames.len(), 2);
        // The single serialized payload reaches both verbatim.
        assert_eq!(first_frames[1], second_frames[1]);
        assert_eq!(frame_value(&first_frames[1])["type"], "heartbeat");
    }

    #[tokio::test]
    async fn notify_builds_an_enriched_order_change_frame() {
        let store = MemoryRecordStore::new();
        let registry = ConnectionRegistry::new(store);
        let sink = MockSink::new();
        registry.connect(sink.clone(), "test-client").await;

        registry
            .notify(update_notification(3, order(1, OrderStatus::Shipped)))
            .await
            .unwrap();

        let frames = sink.sent_frames().await;
        let value = frame_value(&frames[1]);
        assert_eq!(value["type"], "order_change");
        assert_eq!(value["data"]["change_id"], 3);
        assert_eq!(value["data"]["operation"], "UPDATE");
        assert_eq!(value["data"]["order_data"]["status"], "shipped");
    }

    #[tokio::test]
    async fn stats_reflect_the_live_connection_set() {
        let store = MemoryRecordStore::new();
        let registry = ConnectionRegistry::new(store);
        let sink = MockSink::new();
        let id = registry.connect(sink.clone(), "dashboard/1.0").await;

        let stats = registry.get_stats().await;
        assert_eq!(stats.total_connections, 1);
        assert_eq!(stats.connections[0].client_info, "dashboard/1.0");

        registry.disconnect(id).await;
        assert_eq!(registry.get_stats().await.total_connections, 0);
    }
}
