use orderstream_sdk::objects::order::{OrderSnapshot, OrderStatus as WireStatus};
use sqlx::PgPool;

/// A row of the `orders` table. Owned by the record store; the pipeline
/// only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub customer_name: String,
    pub product_name: String,
    pub status: OrderStatus,
    pub created_at: time::OffsetDateTime,
    pub updated_at: time::OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
}

impl Order {
    pub async fn fetch_by_id(pool: &PgPool, id: i64) -> Result<Option<Order>, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            "SELECT id, customer_name, product_name, status, created_at, updated_at \
             FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// All orders, most recently touched first. This is the initial
    /// snapshot sent to every new connection.
    pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Order>, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            "SELECT id, customer_name, product_name, status, created_at, updated_at \
             FROM orders ORDER BY updated_at DESC",
        )
        .fetch_all(pool)
        .await
    }
}

impl From<OrderStatus> for WireStatus {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => WireStatus::Pending,
            OrderStatus::Shipped => WireStatus::Shipped,
            OrderStatus::Delivered => WireStatus::Delivered,
        }
    }
}

impl From<&Order> for OrderSnapshot {
    fn from(order: &Order) -> Self {
        OrderSnapshot {
            id: order.id,
            customer_name: order.customer_name.clone(),
            product_name: order.product_name.clone(),
            status: order.status.into(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}
