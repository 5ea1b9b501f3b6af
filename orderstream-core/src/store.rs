//! The boundary to the persistent record store.
//!
//! The pipeline talks to the store through the [`OrderStore`] and
//! [`ChangeLogStore`] traits so the processors and the connection
//! registry can be exercised against in-memory implementations.
//! [`PgRecordStore`] is the production implementation over a bounded
//! Postgres pool; no caller holds a pooled connection across more than
//! a single query.

use crate::entities::{ChangeRow, Order};
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the current order set.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn order_by_id(&self, id: i64) -> Result<Option<Order>, StoreError>;

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError>;
}

/// Access to the append-only change log.
#[async_trait]
pub trait ChangeLogStore: Send + Sync {
    /// Up to `limit` unprocessed entries ordered `(changed_at ASC, id ASC)`.
    async fn unprocessed_changes(&self, limit: i64) -> Result<Vec<ChangeRow>, StoreError>;

    /// Flip the processed flag for the given entries in one statement.
    async fn mark_processed(&self, ids: &[i64]) -> Result<(), StoreError>;

    /// Number of entries whose `changed_at` is after `cutoff`.
    async fn recent_change_count(&self, cutoff: time::OffsetDateTime)
    -> Result<i64, StoreError>;
}

/// Production store over a pooled Postgres connection.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Cheap liveness probe for health reporting.
    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|value| value == 1)
            .unwrap_or(false)
    }
}

#[async_trait]
impl OrderStore for PgRecordStore {
    async fn order_by_id(&self, id: i64) -> Result<Option<Order>, StoreError> {
        Ok(Order::fetch_by_id(&self.pool, id).await?)
    }

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(Order::fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl ChangeLogStore for PgRecordStore {
    async fn unprocessed_changes(&self, limit: i64) -> Result<Vec<ChangeRow>, StoreError> {
        Ok(ChangeRow::fetch_unprocessed(&self.pool, limit).await?)
    }

    async fn mark_processed(&self, ids: &[i64]) -> Result<(), StoreError> {
        Ok(ChangeRow::mark_processed(&self.pool, ids).await?)
    }

    async fn recent_change_count(
        &self,
        cutoff: time::OffsetDateTime,
    ) -> Result<i64, StoreError> {
        Ok(ChangeRow::count_since(&self.pool, cutoff).await?)
    }
}
