use orderstream_sdk::objects::ws::ChangeOperation;
use sqlx::PgPool;
use thiserror::Error;

/// A change-log row as fetched from `order_changes`, before the
/// operation string has been validated.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChangeRow {
    pub id: i64,
    pub order_id: i64,
    pub operation_type: String,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changed_at: time::OffsetDateTime,
}

/// A validated change-log entry.
#[derive(Debug, Clone)]
pub struct OrderChange {
    pub id: i64,
    pub order_id: i64,
    pub operation: ChangeOperation,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changed_at: time::OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum ChangeParseError {
    #[error("change {change_id}: unknown operation type {value:?}")]
    UnknownOperation { change_id: i64, value: String },
}

impl TryFrom<ChangeRow> for OrderChange {
    type Error = ChangeParseError;

    fn try_from(row: ChangeRow) -> Result<Self, Self::Error> {
        let operation = match row.operation_type.as_str() {
            "INSERT" => ChangeOperation::Insert,
            "UPDATE" => ChangeOperation::Update,
            "DELETE" => ChangeOperation::Delete,
            other => {
                return Err(ChangeParseError::UnknownOperation {
                    change_id: row.id,
                    value: other.to_owned(),
                });
            }
        };
        Ok(OrderChange {
            id: row.id,
            order_id: row.order_id,
            operation,
            old_data: row.old_data,
            new_data: row.new_data,
            changed_at: row.changed_at,
        })
    }
}

impl ChangeRow {
    /// Unprocessed entries in batch order. The ordering holds within one
    /// batch only; a row committed with an earlier `changed_at` after a
    /// batch was fetched is picked up by a later poll, out of global
    /// order.
    pub async fn fetch_unprocessed(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<ChangeRow>, sqlx::Error> {
        sqlx::query_as::<_, ChangeRow>(
            "SELECT id, order_id, operation_type, old_data, new_data, changed_at \
             FROM order_changes WHERE processed = FALSE \
             ORDER BY changed_at ASC, id ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Claim a set of entries in one statement.
    pub async fn mark_processed(pool: &PgPool, ids: &[i64]) -> Result<(), sqlx::Error> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE order_changes SET processed = TRUE WHERE id = ANY($1)")
            .bind(ids)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn count_since(
        pool: &PgPool,
        cutoff: time::OffsetDateTime,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM order_changes WHERE changed_at > $1")
            .bind(cutoff)
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(operation: &str) -> ChangeRow {
        ChangeRow {
            id: 42,
            order_id: 7,
            operation_type: operation.to_owned(),
            old_data: None,
            new_data: Some(serde_json::json!({"status": "pending"})),
            changed_at: time::OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn known_operations_parse() {
        for (text, expected) in [
            ("INSERT", ChangeOperation::Insert),
            ("UPDATE", ChangeOperation::Update),
            ("DELETE", ChangeOperation::Delete),
        ] {
            let change = OrderChange::try_from(row(text)).unwrap();
            assert_eq!(change.operation, expected);
            assert_eq!(change.id, 42);
            assert_eq!(change.order_id, 7);
        }
    }

    #[test]
    fn unknown_operation_is_rejected_with_the_entry_id() {
        let err = OrderChange::try_from(row("TRUNCATE")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("42"));
        assert!(message.contains("TRUNCATE"));
    }
}
