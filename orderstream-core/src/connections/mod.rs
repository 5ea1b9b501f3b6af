//! Live client connection ownership and broadcast delivery.

pub mod registry;
pub mod transport;

pub use registry::{ConnectionId, ConnectionInfo, ConnectionRegistry, ConnectionStats};
pub use transport::{ConnectionSink, SinkError};
