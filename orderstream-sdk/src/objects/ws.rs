//! WebSocket message types for the live order feed.
//!
//! Every server-to-client frame is a JSON envelope with three fields:
//!
//! ```json
//! {"type":"order_change","data":{...},"timestamp":"2026-08-06T12:00:00Z"}
//! {"type":"heartbeat","data":{"server_time":"..."},"timestamp":"..."}
//! ```
//!
//! # Protocol
//!
//! 1. Immediately after the upgrade the server sends one `initial_data`
//!    frame carrying the full current order set (or an `error` frame if
//!    the snapshot could not be loaded).
//! 2. `order_change` frames follow as mutations are observed.
//! 3. `heartbeat` frames are sent on a fixed interval to keep idle
//!    transports open.
//! 4. The only meaningful client-to-server frame is `{"type":"ping"}`,
//!    answered with a `heartbeat`; every other inbound payload is
//!    dropped without a reply.

use serde::{Deserialize, Serialize};

use super::order::OrderSnapshot;

/// Row-level operation recorded in the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeOperation::Insert => write!(f, "INSERT"),
            ChangeOperation::Update => write!(f, "UPDATE"),
            ChangeOperation::Delete => write!(f, "DELETE"),
        }
    }
}

/// Typed `data` member of the envelope, dispatched on `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WsServerPayload {
    OrderChange(OrderChangePayload),
    InitialData(InitialDataPayload),
    Heartbeat(HeartbeatPayload),
    Error(ErrorPayload),
}

/// A server-to-client frame: one payload plus the send timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsServerMessage {
    #[serde(flatten)]
    pub payload: WsServerPayload,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: time::OffsetDateTime,
}

impl WsServerMessage {
    /// Wrap a payload, stamping the current server time.
    pub fn now(payload: WsServerPayload) -> Self {
        Self {
            payload,
            timestamp: time::OffsetDateTime::now_utc(),
        }
    }

    pub fn initial_data(orders: Vec<OrderSnapshot>) -> Self {
        Self::now(WsServerPayload::InitialData(InitialDataPayload { orders }))
    }

    pub fn heartbeat() -> Self {
        Self::now(WsServerPayload::Heartbeat(HeartbeatPayload {
            server_time: time::OffsetDateTime::now_utc(),
        }))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::now(WsServerPayload::Error(ErrorPayload {
            message: message.into(),
        }))
    }
}

/// One observed mutation plus the enriched current order state.
///
/// `order_data` is absent for deletes and for rows that were removed
/// between the change and the enrichment query; `previous_data` carries
/// the pre-image recorded by the change log, when there is one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderChangePayload {
    pub change_id: i64,
    pub order_id: i64,
    pub operation: ChangeOperation,
    pub order_data: Option<OrderSnapshot>,
    pub previous_data: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: time::OffsetDateTime,
}

/// The full order set at connect time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialDataPayload {
    pub orders: Vec<OrderSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(with = "time::serde::rfc3339")]
    pub server_time: time::OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Client-to-server frames. Anything that does not deserialize into
/// this enum is discarded by the server without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::order::OrderStatus;

    fn snapshot() -> OrderSnapshot {
        OrderSnapshot {
            id: 1,
            customer_name: "Ada Lovelace".into(),
            product_name: "Widget".into(),
            status: OrderStatus::Shipped,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            updated_at: time::OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn envelope_has_type_data_and_timestamp() {
        let message = WsServerMessage::heartbeat();
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "heartbeat");
        assert!(value["data"]["server_time"].is_string());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn initial_data_wraps_the_order_list() {
        let message = WsServerMessage::initial_data(vec![snapshot()]);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "initial_data");
        assert_eq!(value["data"]["orders"][0]["id"], 1);
        assert_eq!(value["data"]["orders"][0]["status"], "shipped");
        assert_eq!(
            value["data"]["orders"][0]["created_at"],
            "1970-01-01T00:00:00Z"
        );
    }

    #[test]
    fn order_change_serializes_operation_and_nullable_order() {
        let message = WsServerMessage::now(WsServerPayload::OrderChange(OrderChangePayload {
            change_id: 9,
            order_id: 2,
            operation: ChangeOperation::Delete,
            order_data: None,
            previous_data: Some(serde_json::json!({"status": "pending"})),
            timestamp: time::OffsetDateTime::UNIX_EPOCH,
        }));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "order_change");
        assert_eq!(value["data"]["operation"], "DELETE");
        assert!(value["data"]["order_data"].is_null());
        assert_eq!(value["data"]["previous_data"]["status"], "pending");
    }

    #[test]
    fn only_a_structured_ping_parses() {
        assert_eq!(
            serde_json::from_str::<WsClientMessage>(r#"{"type":"ping"}"#).unwrap(),
            WsClientMessage::Ping
        );
        assert!(serde_json::from_str::<WsClientMessage>(r#"{"type":"shutdown"}"#).is_err());
        assert!(serde_json::from_str::<WsClientMessage>("ping").is_err());
        assert!(serde_json::from_str::<WsClientMessage>(r#"{"cmd":"ping"}"#).is_err());
    }
}
