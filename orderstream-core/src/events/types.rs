use crate::entities::Order;
use orderstream_sdk::objects::ws::ChangeOperation;

/// One observed mutation, enriched and ready for delivery.
///
/// `order` is the row's state at enrichment time, which may already be
/// newer than the change that produced this notification. It is `None`
/// for deletes and for rows removed between the change and the
/// enrichment query.
#[derive(Debug, Clone)]
pub struct ChangeNotification {
    pub change_id: i64,
    pub order_id: i64,
    pub operation: ChangeOperation,
    pub order: Option<Order>,
    pub previous_data: Option<serde_json::Value>,
    pub changed_at: time::OffsetDateTime,
}
