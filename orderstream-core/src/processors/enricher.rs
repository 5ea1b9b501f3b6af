use crate::entities::OrderChange;
use crate::events::ChangeNotification;
use crate::store::{OrderStore, StoreError};
use orderstream_sdk::objects::ws::ChangeOperation;
use std::sync::Arc;
use tracing::warn;

/// Attaches the current order state to a validated change entry.
///
/// Enrichment always reads the row as it is *now*, so a notification
/// for an older change can carry newer field values than the change
/// itself described.
pub struct OrderEnricher {
    orders: Arc<dyn OrderStore>,
}

impl OrderEnricher {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    pub async fn enrich(&self, change: OrderChange) -> Result<ChangeNotification, StoreError> {
        let order = match change.operation {
            ChangeOperation::Insert | ChangeOperation::Update => {
                let order = self.orders.order_by_id(change.order_id).await?;
                if order.is_none() {
                    warn!(
                        change_id = change.id,
                        order_id = change.order_id,
                        "order missing during enrichment, delivering without current state"
                    );
                }
                order
            }
            ChangeOperation::Delete => None,
        };

        Ok(ChangeNotification {
            change_id: change.id,
            order_id: change.order_id,
            operation: change.operation,
            order,
            previous_data: change.old_data,
            changed_at: change.changed_at,
        })
    }
}
