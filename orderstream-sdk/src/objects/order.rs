use serde::{Deserialize, Serialize};

/// Order lifecycle states as exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
}

/// Current state of a single order as sent to clients, both inside the
/// initial snapshot and on every enriched change frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: i64,
    pub customer_name: String,
    pub product_name: String,
    pub status: OrderStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: time::OffsetDateTime,
}
