//! In-memory fakes shared by the module tests.

use crate::connections::{ConnectionSink, SinkError};
use crate::entities::{ChangeRow, Order, OrderStatus};
use crate::events::{ChangeNotification, Subscriber, SubscriberError};
use crate::store::{ChangeLogStore, OrderStore, StoreError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

pub fn order(id: i64, status: OrderStatus) -> Order {
    let now = time::OffsetDateTime::now_utc();
    Order {
        id,
        customer_name: format!("customer-{id}"),
        product_name: format!("product-{id}"),
        status,
        created_at: now,
        updated_at: now,
    }
}

pub fn change_row(id: i64, order_id: i64, operation: &str) -> ChangeRow {
    ChangeRow {
        id,
        order_id,
        operation_type: operation.to_owned(),
        old_data: None,
        new_data: None,
        changed_at: time::OffsetDateTime::now_utc(),
    }
}

/// In-memory record store with injectable failures.
#[derive(Default)]
pub struct MemoryRecordStore {
    orders: Mutex<Vec<Order>>,
    changes: Mutex<Vec<(ChangeRow, bool)>>,
    fail_order_ids: Mutex<HashSet<i64>>,
    pub fail_all_orders: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn push_order(&self, order: Order) {
        self.orders.lock().await.push(order);
    }

    pub async fn push_change(&self, row: ChangeRow) {
        self.changes.lock().await.push((row, false));
    }

    pub async fn processed_ids(&self) -> Vec<i64> {
        self.changes
            .lock()
            .await
            .iter()
            .filter(|(_, processed)| *processed)
            .map(|(row, _)| row.id)
            .collect()
    }

    pub async fn fail_enrichment_for(&self, order_id: i64) {
        self.fail_order_ids.lock().await.insert(order_id);
    }

    pub async fn clear_enrichment_failures(&self) {
        self.fail_order_ids.lock().await.clear();
    }
}

#[async_trait]
impl OrderStore for MemoryRecordStore {
    async fn order_by_id(&self, id: i64) -> Result<Option<Order>, StoreError> {
        if self.fail_order_ids.lock().await.contains(&id) {
            return Err(StoreError::Unavailable(format!("order {id} lookup failed")));
        }
        Ok(self.orders.lock().await.iter().find(|o| o.id == id).cloned())
    }

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        if self.fail_all_orders.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("orders unavailable".into()));
        }
        Ok(self.orders.lock().await.clone())
    }
}

#[async_trait]
impl ChangeLogStore for MemoryRecordStore {
    async fn unprocessed_changes(&self, limit: i64) -> Result<Vec<ChangeRow>, StoreError> {
        let changes = self.changes.lock().await;
        let mut rows: Vec<ChangeRow> = changes
            .iter()
            .filter(|(_, processed)| !*processed)
            .map(|(row, _)| row.clone())
            .collect();
        rows.sort_by_key(|row| (row.changed_at, row.id));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn mark_processed(&self, ids: &[i64]) -> Result<(), StoreError> {
        let mut changes = self.changes.lock().await;
        for (row, processed) in changes.iter_mut() {
            if ids.contains(&row.id) {
                *processed = true;
            }
        }
        Ok(())
    }

    async fn recent_change_count(
        &self,
        cutoff: time::OffsetDateTime,
    ) -> Result<i64, StoreError> {
        Ok(self
            .changes
            .lock()
            .await
            .iter()
            .filter(|(row, _)| row.changed_at > cutoff)
            .count() as i64)
    }
}

/// Records every frame pushed through it; optionally fails each send.
pub struct MockSink {
    sent: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl MockSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn failing() -> Arc<Self> {
        let sink = Self::new();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    pub async fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ConnectionSink for MockSink {
    async fn send_text(&self, text: &str) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::new("connection reset"));
        }
        self.sent.lock().await.push(text.to_owned());
        Ok(())
    }
}

/// Counts deliveries; optionally fails every one.
pub struct RecordingSubscriber {
    delivered: AtomicUsize,
    fail: bool,
    pub notifications: Mutex<Vec<ChangeNotification>>,
}

impl RecordingSubscriber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            delivered: AtomicUsize::new(0),
            fail: false,
            notifications: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            delivered: AtomicUsize::new(0),
            fail: true,
            notifications: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Subscriber for RecordingSubscriber {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, notification: ChangeNotification) -> Result<(), SubscriberError> {
        self.delivered.fetch_add(1, Ordering::SeqCst);
        self.notifications.lock().await.push(notification);
        if self.fail {
            return Err("subscriber failure injected".into());
        }
        Ok(())
    }
}
