pub mod order;
pub mod ws;

pub use order::{OrderSnapshot, OrderStatus};
pub use ws::{
    ChangeOperation, ErrorPayload, HeartbeatPayload, InitialDataPayload, OrderChangePayload,
    WsClientMessage, WsServerMessage, WsServerPayload,
};
